//! Data models for the ingestion pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---

/// Threshold assigned to sensors created on first sight.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Column limits, mirrored by the storage schema.
pub const MAX_SENSOR_ID_LEN: usize = 20;
pub const MAX_UNIT_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// One typed row parsed from a CSV source.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    // ---
    pub timestamp: NaiveDateTime,
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
}

/// A named source of readings with its alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    // ---
    pub sensor_id: String,
    pub threshold: f64,
    pub unit: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A committed reading, as stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
    pub is_alert: bool,
    pub created_at: NaiveDateTime,
}

/// A reading staged by the ingestion engine, not yet assigned a row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    // ---
    pub timestamp: NaiveDateTime,
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
    pub is_alert: bool,
    pub created_at: NaiveDateTime,
}

/// Outcome of importing one parsed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    // ---
    pub total_records: usize,
    pub new_records: usize,
}

/// Snapshot served by `GET /api/status/alert`.
///
/// `has_alerts` only looks at the last hour while `alerts` is the most recent
/// alerted readings regardless of age.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    // ---
    pub has_alerts: bool,
    pub alert_count: usize,
    pub alerts: Vec<Reading>,
}

impl Sensor {
    /// Build a sensor as created on first sight.
    pub fn new(sensor_id: &str, unit: &str, description: Option<&str>) -> Self {
        // ---
        let description = match description {
            Some(d) if !d.is_empty() => truncate_chars(d, MAX_DESCRIPTION_LEN),
            _ => format!("Sensor {sensor_id}"),
        };

        Sensor {
            sensor_id: sensor_id.to_string(),
            threshold: DEFAULT_THRESHOLD,
            unit: unit.to_string(),
            description: Some(description),
            is_active: true,
        }
    }

    /// Whether `value` trips this sensor's alert.
    pub fn is_alert(&self, value: f64) -> bool {
        value > self.threshold
    }
}

/// Cut `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    // ---
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
