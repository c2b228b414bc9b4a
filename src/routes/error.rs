//! Mapping of pipeline failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::MessageResponse;
use crate::error::PipelineError;

// ---

/// Handler error. Renders as `{ "success": false, "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Pipeline(PipelineError::Parse(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Pipeline(PipelineError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Pipeline(err @ (PipelineError::Storage(_) | PipelineError::Io(_))) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = MessageResponse {
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}
