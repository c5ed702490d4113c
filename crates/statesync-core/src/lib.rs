//! State-ownership and synchronization engine for the Statesync service.
//!
//! Clients create named entities made of members. Each member records the
//! one client token allowed to write it. This crate holds the in-memory
//! source of truth and the machinery that pushes it out to observers:
//!
//! - [`store`] -- concurrent entity store with per-entity locking
//! - [`registry`] -- issued client tokens
//! - [`authority`] -- the ownership check applied to every member write
//! - [`fanout`] -- per-subscriber bounded delivery shared by both streams
//! - [`presence`] -- "client connected" notifications
//! - [`broadcaster`] -- periodic full-state resync to stream subscribers
//! - [`service`] -- the facade exposed over the RPC boundary
//! - [`config`] -- YAML configuration
//! - [`dump`] -- optional periodic state dump to the log
//!
//! # Concurrency
//!
//! Every operation on [`SyncService`] is synchronous and non-blocking:
//! locks are held only for the duration of a map lookup or a member
//! write, and fan-out delivery uses `try_send` so a slow consumer never
//! stalls the caller. The only long-lived tasks are the broadcaster and
//! the per-connection stream tasks owned by the server crate.

pub mod authority;
pub mod broadcaster;
pub mod config;
pub mod dump;
pub mod error;
pub mod fanout;
pub mod presence;
pub mod registry;
pub mod service;
pub mod store;

// Re-export primary types for convenience.
pub use broadcaster::{
    SnapshotBatch, SnapshotBroadcaster, TickReport, run_broadcaster, spawn_broadcaster,
};
pub use config::{ConfigError, SyncConfig};
pub use dump::spawn_state_dump;
pub use error::{StoreError, SyncError};
pub use fanout::{CloseReason, DeliveryReport, Fanout, FanoutConfig, Subscription};
pub use presence::PresenceNotifier;
pub use registry::ClientRegistry;
pub use service::SyncService;
pub use store::{Entity, EntityStore};
