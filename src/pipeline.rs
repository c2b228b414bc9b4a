//! The ingestion pipeline as a single shared object.
//!
//! Constructed once at startup and shared behind an `Arc` by the HTTP routes
//! and the folder scan scheduler.

use std::collections::HashSet;

use chrono::{Duration, Local};

use crate::error::Result;
use crate::ingest::IngestionEngine;
use crate::models::{AlertStatus, CsvRecord, ImportSummary, Reading, Sensor};
use crate::registry::SensorRegistry;
use crate::store::DynStore;

// ---

/// Readings considered by the alert list.
const ALERT_QUERY_LIMIT: i64 = 100;

/// Readings returned in the alert list.
const ALERTS_RETURNED: usize = 50;

#[derive(Clone)]
pub struct Pipeline {
    store: DynStore,
    registry: SensorRegistry,
    engine: IngestionEngine,
}

impl Pipeline {
    // ---
    pub fn new(store: DynStore) -> Self {
        let registry = SensorRegistry::new(store.clone());
        let engine = IngestionEngine::new(store.clone(), registry.clone());
        Self {
            store,
            registry,
            engine,
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &IngestionEngine {
        &self.engine
    }

    /// Register every distinct sensor in `records`, then ingest them.
    ///
    /// Each sensor takes the unit of its first record in the batch.
    pub async fn import(&self, records: &[CsvRecord]) -> Result<ImportSummary> {
        // ---
        let mut first_units: Vec<(&str, &str)> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for record in records {
            if seen.insert(record.sensor_id.as_str()) {
                first_units.push((record.sensor_id.as_str(), record.unit.as_str()));
            }
        }

        for (sensor_id, unit) in first_units {
            self.registry.upsert(sensor_id, unit, None).await?;
        }

        let new_records = self.engine.ingest(records).await?;

        Ok(ImportSummary {
            total_records: records.len(),
            new_records,
        })
    }

    /// Change a sensor's threshold; `Ok(false)` if the sensor is unknown.
    pub async fn set_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool> {
        self.registry.set_threshold(sensor_id, threshold).await
    }

    pub async fn latest_readings(&self, limit: i64) -> Result<Vec<Reading>> {
        self.store.latest_readings(Some(limit)).await
    }

    pub async fn all_readings(&self) -> Result<Vec<Reading>> {
        self.store.latest_readings(None).await
    }

    pub async fn active_sensors(&self) -> Result<Vec<Sensor>> {
        self.registry.active_sensors().await
    }

    /// Whether anything alerted in the last hour, plus the latest alerts of any age.
    pub async fn alert_status(&self) -> Result<AlertStatus> {
        // ---
        let since = Local::now().naive_local() - Duration::hours(1);
        let has_alerts = self.store.any_alert_since(since).await?;

        let mut alerts = self.store.recent_alerts(ALERT_QUERY_LIMIT).await?;
        let alert_count = alerts.len();
        alerts.truncate(ALERTS_RETURNED);

        Ok(AlertStatus {
            has_alerts,
            alert_count,
            alerts,
        })
    }
}
