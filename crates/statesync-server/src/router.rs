//! Axum router construction.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS enabled for browser clients and HTTP tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router. See [`handlers`] and [`ws`] for the routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/", get(handlers::index))
        .route("/api/status", get(handlers::status))
        // Streams
        .route("/ws/state", get(ws::ws_state))
        .route("/ws/subscriptions", get(ws::ws_subscriptions))
        // Request/response
        .route("/api/connect", post(handlers::connect))
        .route("/api/state", get(handlers::full_load))
        .route("/api/entities", post(handlers::create_entity))
        .route(
            "/api/entities/{id}",
            get(handlers::retrieve_state).delete(handlers::remove_entity),
        )
        .route("/api/entities/{id}/update", post(handlers::update_entity))
        .route(
            "/api/entities/{id}/authority",
            get(handlers::retrieve_authority),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
