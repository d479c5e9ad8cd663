use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use easel_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `easel_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A malformed multipart body.
    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Security(msg) => {
                    tracing::warn!(error = %msg, "Security rejection");
                    (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
                }
                CoreError::Template(msg) => {
                    tracing::error!(error = %msg, "Template error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR", msg.clone())
                }
                CoreError::Transport(msg) => {
                    // Transport faults are swallowed at the broadcast
                    // layer; one reaching a handler is a bug.
                    tracing::error!(error = %msg, "Transport error surfaced to handler");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::Multipart(err) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("Malformed multipart body: {err}"),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
