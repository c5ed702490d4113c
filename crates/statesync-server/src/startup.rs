//! Server startup helper for embedding in the node binary.
//!
//! Provides [`spawn_server`], which binds eagerly and then serves on a
//! background Tokio task, so bind failures surface to the caller instead
//! of being lost inside the task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, serve};
use crate::state::AppState;

/// Bind `config`'s address and serve on a background task.
///
/// The task runs until the state's shutdown signal fires. The returned
/// handle resolves to the server's exit status.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<Result<(), ServerError>>, ServerError> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    tracing::info!(%addr, "Statesync server spawned on background task");
    Ok(tokio::spawn(serve(listener, state)))
}
