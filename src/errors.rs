use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the token core.
///
/// Validation failures are deliberately uniform: a caller is never told
/// whether a token was unknown, inactive, or expired. The distinction is
/// logged server-side only.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("authentication required")]
    MissingToken,

    #[error("permission denied: {permission}")]
    Forbidden { permission: String },

    #[error("token not found")]
    TokenNotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage failure")]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_token",
                "invalid or expired token".to_string(),
            ),
            AppError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "missing_token",
                "authentication required".to_string(),
            ),
            AppError::Forbidden { permission } => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                format!("missing required permission '{}'", permission),
            ),
            AppError::TokenNotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "token_not_found",
                "token not found".to_string(),
            ),
            AppError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                reason.clone(),
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "storage_failure",
                    "storage failure".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
