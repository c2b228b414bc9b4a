//! `POST /api/upload-csv`: import an uploaded CSV file.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::{ApiError, AppState};
use crate::csv_parser;

// ---

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    message: String,
    total_records: usize,
    new_records: usize,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/upload-csv", post(upload_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn upload_csv(
    State(pipeline): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    // ---
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = match upload {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => return Err(ApiError::BadRequest("No file uploaded".to_string())),
    };

    if !has_csv_extension(&file_name) {
        return Err(ApiError::BadRequest(
            "Invalid file format. Please upload a CSV file.".to_string(),
        ));
    }

    let records = csv_parser::parse_bytes(&bytes)?;
    if records.is_empty() {
        return Err(ApiError::BadRequest(
            "CSV file is empty or has invalid format".to_string(),
        ));
    }

    let summary = pipeline.import(&records).await?;
    info!(
        file = %file_name,
        total_records = summary.total_records,
        new_records = summary.new_records,
        "Processed uploaded CSV"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "Successfully processed {} new records from {} total records",
            summary.new_records, summary.total_records
        ),
        total_records: summary.total_records,
        new_records: summary.new_records,
    }))
}

fn has_csv_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
}
