//! Read-side routes over stored readings and alert state.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, DataResponse};
use crate::models::{AlertStatus, Reading};

// ---

const DEFAULT_LATEST_LIMIT: i64 = 50;

/// Query parameters for `GET /api/latest`
#[derive(Debug, Deserialize)]
struct LatestQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AlertStatusResponse {
    success: bool,
    #[serde(flatten)]
    status: AlertStatus,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/latest", get(latest))
        .route("/api/data/all", get(all_data))
        .route("/api/status/alert", get(alert_status))
}

async fn latest(
    State(pipeline): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<DataResponse<Vec<Reading>>>, ApiError> {
    // ---
    let limit = params.limit.unwrap_or(DEFAULT_LATEST_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".to_string()));
    }

    let data = pipeline.latest_readings(limit).await?;
    Ok(Json(DataResponse::new(data)))
}

async fn all_data(
    State(pipeline): State<AppState>,
) -> Result<Json<DataResponse<Vec<Reading>>>, ApiError> {
    let data = pipeline.all_readings().await?;
    Ok(Json(DataResponse::new(data)))
}

async fn alert_status(
    State(pipeline): State<AppState>,
) -> Result<Json<AlertStatusResponse>, ApiError> {
    // ---
    let status = pipeline.alert_status().await?;
    Ok(Json(AlertStatusResponse {
        success: true,
        status,
    }))
}
