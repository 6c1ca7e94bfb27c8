use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Request-boundary error taxonomy. Every failure in the pipeline maps to
/// exactly one variant and is converted to a JSON response here, so handlers
/// never build error responses themselves.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User ID does not match authenticated user")]
    OwnershipMismatch,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "No token provided".to_string())
            }
            AppError::InvalidToken(detail) => {
                // Verification internals stay in the logs.
                tracing::warn!("Token verification failed: {}", detail);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::OwnershipMismatch => (
                StatusCode::FORBIDDEN,
                "User ID does not match authenticated user".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Upstream(description) => {
                tracing::error!("Remote document API rejected upload: {}", description);
                (StatusCode::INTERNAL_SERVER_ERROR, description)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Upload failed: {}", msg),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
