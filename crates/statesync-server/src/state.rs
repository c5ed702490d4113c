//! Shared application state for the RPC server.
//!
//! [`AppState`] wraps the [`SyncService`] and a shutdown signal. Request
//! handlers call the service directly; stream handlers also watch the
//! signal so open `WebSocket`s close when the process stops.

use std::sync::Arc;

use statesync_core::{SyncConfig, SyncService};
use tokio::sync::watch;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// The synchronization service.
    pub service: Arc<SyncService>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Create application state around an existing service.
    pub fn new(service: Arc<SyncService>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { service, shutdown }
    }

    /// Create application state with a fresh service built from `config`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(Arc::new(SyncService::new(config)))
    }

    /// A receiver that flips to `true` when shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Begin shutdown: background tasks and open streams wind down.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolve once `signal` flips to `true` or its sender is dropped.
pub async fn wait_for_shutdown(mut signal: watch::Receiver<bool>) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}
