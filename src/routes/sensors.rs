use axum::{extract::State, routing::get, Json, Router};

use super::{ApiError, AppState, DataResponse};
use crate::models::Sensor;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sensors", get(sensors))
}

/// `GET /api/sensors`: all active sensors.
async fn sensors(
    State(pipeline): State<AppState>,
) -> Result<Json<DataResponse<Vec<Sensor>>>, ApiError> {
    let data = pipeline.active_sensors().await?;
    Ok(Json(DataResponse::new(data)))
}
