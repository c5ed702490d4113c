//! Request and response bodies for the RPC surface.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ClientToken, ClientType};
use crate::records::{EntitySnapshot, MemberEdit, MemberState};

/// Body of a `Connect` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConnectRequest {
    /// Category the caller declares for itself.
    #[serde(rename = "type")]
    pub client_type: ClientType,
}

/// Reply to a `Connect` call: the issued token and the echoed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConnectResponse {
    /// Newly issued token.
    pub token: ClientToken,
    /// Echo of the declared type.
    #[serde(rename = "type")]
    pub client_type: ClientType,
}

/// Reply to `FullLoad`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FullLoadResponse {
    /// Number of entities in `state`.
    pub count: usize,
    /// Every entity in the store, in unspecified order.
    pub state: Vec<EntitySnapshot>,
}

/// Body of a `CreateEntity` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreateEntityRequest {
    /// Caller's token.
    pub token: ClientToken,
    /// Identifier of the new entity.
    pub entity_id: String,
    /// Opaque classification string.
    pub prefab_name: String,
    /// Members, each carrying its own authoritative owner.
    #[serde(default)]
    pub members: Vec<MemberState>,
}

/// Body of an `UpdateEntity` call. The entity id travels in the path.
///
/// Edits are applied in order and the first failure stops processing.
/// Edits before the failing one stay applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpdateEntityRequest {
    /// Caller's token.
    pub token: ClientToken,
    /// Member writes, applied in order.
    #[serde(default)]
    pub members: Vec<MemberEdit>,
}

/// Structured outcome of a mutating call.
///
/// Domain failures (unknown entity, unknown member, ownership mismatch,
/// duplicate id) are reported here rather than as transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GenericResponse {
    /// Whether the call took full effect.
    pub successful: bool,
    /// Failure description, empty on success.
    pub error: String,
}

impl GenericResponse {
    /// A successful outcome.
    pub const fn ok() -> Self {
        Self {
            successful: true,
            error: String::new(),
        }
    }

    /// A failed outcome carrying `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            successful: false,
            error: error.into(),
        }
    }
}

/// Query string of the two stream endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamQuery {
    /// Caller's token.
    pub token: ClientToken,
}

/// Counters reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatusResponse {
    /// Entities in the store.
    pub entities: usize,
    /// Clients that have connected since startup.
    pub clients: usize,
    /// Open state streams.
    pub state_subscribers: usize,
    /// Open presence streams.
    pub presence_subscribers: usize,
    /// Broadcast period in milliseconds.
    pub broadcast_interval_ms: u64,
}
