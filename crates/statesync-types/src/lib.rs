//! Shared type definitions for the Statesync service.
//!
//! This crate is the single source of truth for every record that crosses
//! the RPC boundary. Server and clients both depend on it; types flow to
//! `TypeScript` via `ts-rs` for web clients.
//!
//! # Modules
//!
//! - [`ids`] -- Client tokens and entity identifiers
//! - [`records`] -- Entity snapshots, members, and presence events
//! - [`api`] -- Request and response bodies for each operation

pub mod api;
pub mod ids;
pub mod records;

// Re-export all public types at crate root for convenience.
pub use api::{
    ConnectRequest, ConnectResponse, CreateEntityRequest, FullLoadResponse, GenericResponse,
    StatusResponse, StreamQuery, UpdateEntityRequest,
};
pub use ids::{ClientToken, ClientType, EntityId};
pub use records::{EntitySnapshot, MemberEdit, MemberState, PresenceEvent};

#[cfg(test)]
mod tests {
    #[test]
    fn export_bindings() {
        // Exporting writes the `.ts` files into `bindings/` relative to the
        // crate root.
        use ts_rs::TS;

        let _ = crate::ids::ClientToken::export_all();
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::ClientType::export_all();
        let _ = crate::records::EntitySnapshot::export_all();
        let _ = crate::records::PresenceEvent::export_all();
        let _ = crate::api::GenericResponse::export_all();
        let _ = crate::api::UpdateEntityRequest::export_all();
        let _ = crate::api::CreateEntityRequest::export_all();
    }
}
