//! `POST /api/set-threshold`: change a sensor's alert threshold.

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::{ApiError, AppState, MessageResponse};

// ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetThresholdRequest {
    #[serde(default)]
    sensor_id: String,
    threshold: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/set-threshold", post(set_threshold))
}

async fn set_threshold(
    State(pipeline): State<AppState>,
    body: Result<Json<SetThresholdRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // ---
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected set-threshold body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;

    if req.sensor_id.is_empty() || req.threshold.is_nan() || req.threshold <= 0.0 {
        return Err(ApiError::BadRequest(
            "Invalid sensor ID or threshold value".to_string(),
        ));
    }

    if !pipeline.set_threshold(&req.sensor_id, req.threshold).await? {
        return Err(ApiError::NotFound("Sensor not found".to_string()));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Threshold updated successfully".to_string(),
    }))
}
