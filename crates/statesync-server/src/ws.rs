//! `WebSocket` handlers for the two server-push streams.
//!
//! - `GET /ws/state?token=...` -- one JSON text frame per entity snapshot,
//!   a full resync every broadcast period (each tick's batch is written
//!   out frame by frame)
//! - `GET /ws/subscriptions?token=...` -- one JSON text frame per
//!   presence event
//!
//! The token is checked before the upgrade, so an unknown caller gets a
//! plain `403`. After the upgrade, the connection task owns the
//! [`Subscription`]; whenever the task ends (peer gone, send failure,
//! eviction, shutdown) the subscription is dropped and its registration
//! removed. When the server ends a stream it sends a close frame carrying
//! the reason, so clients never see a silent end.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use statesync_core::{CloseReason, SnapshotBatch, Subscription};
use statesync_types::{PresenceEvent, StreamQuery};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::reject;
use crate::state::AppState;

/// Open the periodic state stream.
///
/// # Route
///
/// `GET /ws/state?token=...`
pub async fn ws_state(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let subscription = match state.service.open_state_stream(&query.token) {
        Ok(subscription) => subscription,
        Err(err) => return reject(err),
    };
    let shutdown = state.shutdown_signal();
    ws.on_upgrade(move |socket| {
        forward(socket, subscription, shutdown, "state", |batch: &SnapshotBatch| {
            batch.iter().map(serde_json::to_string).collect()
        })
    })
}

/// Open the presence event stream.
///
/// # Route
///
/// `GET /ws/subscriptions?token=...`
pub async fn ws_subscriptions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let subscription = match state.service.open_subscription_stream(&query.token) {
        Ok(subscription) => subscription,
        Err(err) => return reject(err),
    };
    let shutdown = state.shutdown_signal();
    ws.on_upgrade(move |socket| {
        forward(socket, subscription, shutdown, "subscriptions", |event: &PresenceEvent| {
            serde_json::to_string(event).map(|json| vec![json])
        })
    })
}

const fn close_code_for(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::Lagged => close_code::AGAIN,
        CloseReason::Replaced | CloseReason::Unsubscribed => close_code::POLICY,
        CloseReason::Disconnected => close_code::NORMAL,
    }
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    // The peer may already be gone; nothing left to do either way.
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Pump items from `subscription` into `socket` until either side ends.
///
/// `encode` turns one item into the text frames to send, in order.
async fn forward<T, F>(
    mut socket: WebSocket,
    mut subscription: Subscription<T>,
    mut shutdown: watch::Receiver<bool>,
    stream: &'static str,
    encode: F,
) where
    F: Fn(&T) -> Result<Vec<String>, serde_json::Error>,
{
    let token = subscription.token().clone();
    info!(stream, %token, "Stream connected");

    loop {
        tokio::select! {
            item = subscription.recv() => {
                let Some(item) = item else {
                    let reason = subscription.close_reason().unwrap_or(CloseReason::Disconnected);
                    warn!(stream, %token, reason = reason.as_str(), "Stream closed by server");
                    close(&mut socket, close_code_for(reason), reason.as_str()).await;
                    return;
                };
                let frames = match encode(&item) {
                    Ok(frames) => frames,
                    Err(e) => {
                        warn!(stream, %token, "Failed to serialize stream item: {e}");
                        continue;
                    }
                };
                for json in frames {
                    if let Err(e) = socket.send(Message::Text(json.into())).await {
                        warn!(stream, %token, "Stream send failed: {e}");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(stream, %token, "Stream disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(stream, %token, "Stream disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(stream, %token, "WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Clients do not send data on these streams.
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    close(&mut socket, close_code::AWAY, "server shutting down").await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagging_closes_with_try_again_code() {
        assert_eq!(close_code_for(CloseReason::Lagged), close_code::AGAIN);
        assert_eq!(close_code_for(CloseReason::Replaced), close_code::POLICY);
    }
}
