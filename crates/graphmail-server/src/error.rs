//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use graphmail_auth::AuthError;
use graphmail_core::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for route handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures surfaced to API callers as `{"detail": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or rejected request parameters
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(e) => auth_status(e),
            ApiError::Core(CoreError::ValidationError(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Core(CoreError::AuthError(e)) => auth_status(e),
            ApiError::Core(CoreError::GraphError(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn auth_status(e: &AuthError) -> StatusCode {
    if e.requires_reauthentication() {
        StatusCode::UNAUTHORIZED
    } else if e.is_transient() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Auth(AuthError::NoRefreshToken), StatusCode::UNAUTHORIZED),
            (
                ApiError::Auth(AuthError::Transport("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Auth(AuthError::InvalidConfig("bad url".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Core(CoreError::AuthError(AuthError::RefreshRejected {
                    body: "invalid_grant".into(),
                })),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Core(CoreError::ValidationError("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Core(CoreError::GraphError("500".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Core(CoreError::DatabaseError("locked".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_reauthentication_detail() {
        let error = ApiError::Auth(AuthError::NoRefreshToken);
        assert!(error.to_string().contains("re-authentication required"));
    }
}
