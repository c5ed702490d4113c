//! Error types for the RPC layer.
//!
//! [`ApiError`] covers failures that reject a call outright. It converts
//! into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! Domain failures never become an [`ApiError`]; [`classify`] turns them
//! into a `{"successful": false}` body instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use statesync_core::SyncError;
use statesync_types::GenericResponse;

/// Errors that reject a call at the protocol level.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The caller's token was never issued.
    #[error("No VALID token was found: {0}")]
    Unauthorized(String),

    /// The operation exists but has no implementation.
    #[error("{0}")]
    NotImplemented(String),
}

/// Split a service error into a structured failure body (`Ok`) or a
/// protocol-level rejection (`Err`).
pub fn classify(err: SyncError) -> Result<GenericResponse, ApiError> {
    match err {
        SyncError::UnknownClient(token) => Err(ApiError::Unauthorized(token.into_inner())),
        SyncError::NotImplemented(_) => Err(ApiError::NotImplemented(err.to_string())),
        SyncError::Rejected(_) | SyncError::PartiallyApplied { .. } => {
            Ok(GenericResponse::failed(err.to_string()))
        }
    }
}

/// Render a service error as the response the caller should see.
pub fn reject(err: SyncError) -> Response {
    match classify(err) {
        Ok(failure) => Json(failure).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use statesync_core::StoreError;
    use statesync_types::{ClientToken, EntityId};

    use super::*;

    #[test]
    fn protocol_errors_map_to_status_codes() {
        let forbidden = classify(SyncError::UnknownClient(ClientToken::from("x")));
        let forbidden = forbidden.err().unwrap().into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let todo = reject(SyncError::NotImplemented("RetrieveState"));
        assert_eq!(todo.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn domain_errors_become_failure_bodies() {
        let missing = SyncError::from(StoreError::EntityNotFound(EntityId::from("e9")));
        let failure = classify(missing).unwrap();
        assert!(!failure.successful);
        assert_eq!(failure.error, "unknown entity: e9");

        let response = reject(SyncError::PartiallyApplied {
            applied: 1,
            source: StoreError::EntityNotFound(EntityId::from("e9")),
        });
        assert_eq!(response.status(), StatusCode::OK);
    }
}
