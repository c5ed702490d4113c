//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `GET` | `/` | HTML status page |
//! | `GET` | `/api/status` | Status counters |
//! | `POST` | `/api/connect` | Connect |
//! | `GET` | `/api/state` | `FullLoad` |
//! | `POST` | `/api/entities` | `CreateEntity` |
//! | `POST` | `/api/entities/{id}/update` | `UpdateEntity` |
//! | `GET` | `/api/entities/{id}` | `RetrieveState` (not implemented) |
//! | `DELETE` | `/api/entities/{id}` | `RemoveEntity` (not implemented) |
//! | `GET` | `/api/entities/{id}/authority` | `RetrieveAuthority` (not implemented) |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use statesync_core::SyncError;
use statesync_types::{
    ConnectRequest, CreateEntityRequest, EntityId, FullLoadResponse, GenericResponse,
    UpdateEntityRequest,
};

use crate::error::{ApiError, classify, reject};
use crate::state::AppState;

/// Turn a service result into a structured response, keeping
/// protocol-level failures as errors.
fn outcome<T>(result: Result<T, SyncError>) -> Result<Json<GenericResponse>, ApiError> {
    result
        .map_or_else(classify, |_| Ok(GenericResponse::ok()))
        .map(Json)
}

/// Serialize a successful lookup, or render the failure.
fn lookup<T: Serialize>(result: Result<T, SyncError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => reject(err),
    }
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with live counters and the route list.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.service.status();
    let entities = status.entities;
    let clients = status.clients;
    let state_subscribers = status.state_subscribers;
    let presence_subscribers = status.presence_subscribers;
    let interval = status.broadcast_interval_ms;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Statesync</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Statesync</h1>
    <div>
        <div class="metric"><div class="label">Entities</div><div class="value">{entities}</div></div>
        <div class="metric"><div class="label">Clients</div><div class="value">{clients}</div></div>
        <div class="metric"><div class="label">State streams</div><div class="value">{state_subscribers}</div></div>
        <div class="metric"><div class="label">Presence streams</div><div class="value">{presence_subscribers}</div></div>
        <div class="metric"><div class="label">Broadcast (ms)</div><div class="value">{interval}</div></div>
    </div>
    <h2>API</h2>
    <ul>
        <li>POST /api/connect</li>
        <li>GET /api/state</li>
        <li>POST /api/entities</li>
        <li>POST /api/entities/:id/update</li>
        <li>GET /ws/state?token=...</li>
        <li>GET /ws/subscriptions?token=...</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Return entity, client, and subscriber counts.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.status())
}

// ---------------------------------------------------------------------------
// POST /api/connect
// ---------------------------------------------------------------------------

/// Issue a token and announce the new client to presence subscribers.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> impl IntoResponse {
    Json(state.service.connect(request.client_type))
}

// ---------------------------------------------------------------------------
// GET /api/state
// ---------------------------------------------------------------------------

/// Return every entity in the store.
pub async fn full_load(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshots = state.service.full_load();
    Json(FullLoadResponse {
        count: snapshots.len(),
        state: snapshots,
    })
}

// ---------------------------------------------------------------------------
// POST /api/entities
// ---------------------------------------------------------------------------

/// Create an entity. Members keep the owners they arrive with.
pub async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateEntityRequest>,
) -> Result<Json<GenericResponse>, ApiError> {
    outcome(state.service.create_entity(
        &request.token,
        EntityId::from(request.entity_id),
        request.prefab_name,
        request.members,
    ))
}

// ---------------------------------------------------------------------------
// POST /api/entities/{id}/update
// ---------------------------------------------------------------------------

/// Apply member edits in order, stopping at the first failure.
///
/// Edits before a failing one remain applied; the response reports only
/// the failure.
pub async fn update_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEntityRequest>,
) -> Result<Json<GenericResponse>, ApiError> {
    outcome(
        state
            .service
            .update_entity(&request.token, &EntityId::from(id), request.members),
    )
}

// ---------------------------------------------------------------------------
// Declared, not implemented
// ---------------------------------------------------------------------------

/// `DELETE /api/entities/{id}`.
pub async fn remove_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GenericResponse>, ApiError> {
    outcome(state.service.remove_entity(&EntityId::from(id)))
}

/// `GET /api/entities/{id}/authority`.
pub async fn retrieve_authority(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    lookup(state.service.retrieve_authority(&EntityId::from(id)))
}

/// `GET /api/entities/{id}`.
pub async fn retrieve_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    lookup(state.service.retrieve_state(&EntityId::from(id)))
}
