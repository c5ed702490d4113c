//! Statesync node: the server binary.
//!
//! Wires the entity store, broadcaster, and RPC server together and runs
//! until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$STATESYNC_CONFIG` or
//!    `statesync-config.yaml` (defaults when neither exists)
//! 2. Initialize structured logging (tracing)
//! 3. Build the shared service
//! 4. Spawn the snapshot broadcaster and, if configured, the state dump
//! 5. Bind and serve the RPC surface
//! 6. On Ctrl-C, signal shutdown and wait for every task to finish

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use statesync_core::{SyncConfig, spawn_broadcaster, spawn_state_dump};
use statesync_server::{AppState, ServerConfig, spawn_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::NodeError;

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "statesync-config.yaml";

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    // 1. Load configuration. Logging is not up yet, so report the source
    //    once the subscriber exists.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!(source = %source, "statesync-node starting");
    info!(
        host = config.server.host,
        port = config.server.port,
        broadcast_interval_ms = config.broadcast.interval_ms,
        broadcast_buffer = config.broadcast.buffer_capacity,
        max_lagged_ticks = config.broadcast.max_lagged_ticks,
        presence_buffer = config.presence.buffer_capacity,
        "Configuration loaded"
    );

    // 3. Shared service and shutdown signal.
    let state = Arc::new(AppState::from_config(&config));

    // 4. Background tasks.
    let broadcaster = spawn_broadcaster(Arc::clone(&state.service), state.shutdown_signal());
    let dump = config.logging.state_dump_interval().map(|period| {
        info!(period_ms = config.logging.state_dump_interval_ms, "State dump enabled");
        spawn_state_dump(Arc::clone(&state.service), period, state.shutdown_signal())
    });

    // 5. RPC server.
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let server = match spawn_server(&server_config, Arc::clone(&state)).await {
        Ok(handle) => handle,
        Err(e) => {
            state.shutdown();
            return Err(e.into());
        }
    };

    // 6. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    state.shutdown();

    server.await??;
    broadcaster.await?;
    if let Some(dump) = dump {
        dump.await?;
    }

    info!("statesync-node stopped");
    Ok(())
}

/// Load config from `$STATESYNC_CONFIG`, then the default path, then
/// defaults. Environment overrides apply in every case.
fn load_config() -> Result<(SyncConfig, String), NodeError> {
    let path = std::env::var("STATESYNC_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = SyncConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        Ok((SyncConfig::from_env()?, String::from("defaults")))
    }
}

/// `RUST_LOG` wins over `logging.level`; `logging.json` switches the
/// output format.
fn init_tracing(config: &SyncConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
