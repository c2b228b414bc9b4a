//! HTTP gateway: merges every subrouter and attaches the shared pipeline.
//!
//! Each sibling module owns its handlers and exports a `router()`; `main.rs`
//! only ever calls [`router`].

use std::sync::Arc;

use axum::Router;
use serde::Serialize;

use crate::pipeline::Pipeline;

mod error;
mod health;
mod readings;
mod sensors;
mod threshold;
mod upload;

pub use error::ApiError;

// ---

/// State shared by all handlers.
pub type AppState = Arc<Pipeline>;

/// Standard `{ "success": true, "data": T }` envelope.
#[derive(Debug, Serialize)]
pub(crate) struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Standard `{ "success": true, "message": ... }` envelope.
#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    // ---
    Router::new()
        .merge(upload::router())
        .merge(threshold::router())
        .merge(readings::router())
        .merge(sensors::router())
        .merge(health::router())
        .with_state(pipeline)
}
