//! RPC boundary for the Statesync service.
//!
//! This crate exposes [`SyncService`](statesync_core::SyncService) over an
//! Axum HTTP server:
//!
//! - **REST endpoints** for the request/response operations (connect,
//!   full load, create, update, and the three unimplemented lookups)
//! - **`WebSocket` endpoints** for the two server-push streams: periodic
//!   entity snapshots (`/ws/state`) and presence events
//!   (`/ws/subscriptions`)
//! - **Status** as a minimal HTML page (`GET /`) and JSON
//!   (`GET /api/status`)
//!
//! # Errors
//!
//! Unknown tokens are rejected with `403` before any work is done or any
//! stream is upgraded. Domain failures come back as `200` with
//! `{"successful": false, "error": ...}` so clients can branch on them
//! without special-casing transport errors.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use startup::spawn_server;
pub use state::AppState;
