use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use iris_comfy::BackendError;
use iris_core::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain taxonomy ([`CoreError`]) and the backend transport
/// taxonomy ([`BackendError`]) and maps both onto consistent
/// `{error, code}` JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A bad request with a human-readable message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { what, name } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{what} not found: {name}"),
                ),
                CoreError::Malformed(msg) => {
                    (StatusCode::BAD_REQUEST, "MALFORMED", msg.clone())
                }
            },

            AppError::Backend(backend) => match backend {
                BackendError::Unavailable(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "BACKEND_UNAVAILABLE",
                    format!("backend unavailable: {msg}"),
                ),
                BackendError::Rejected { status, body } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "BACKEND_REJECTED",
                    format!("backend rejected the job ({status}): {body}"),
                ),
                BackendError::ArtifactNotFound { filename } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("artifact not found: {filename}"),
                ),
                BackendError::Timeout { attempts } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    format!("job did not complete within {attempts} poll attempts"),
                ),
                BackendError::Failed(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_FAILED",
                    format!("generation failed: {msg}"),
                ),
                BackendError::Malformed(msg) => {
                    tracing::error!(error = %msg, "Malformed backend response");
                    (
                        StatusCode::BAD_GATEWAY,
                        "BAD_BACKEND_RESPONSE",
                        "The backend returned an unparsable response".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
