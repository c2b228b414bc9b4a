//! Ingestion engine: deduplicate, flag alerts, and commit parsed readings.

use std::collections::{HashMap, HashSet};

use chrono::{Local, NaiveDateTime};

use crate::error::Result;
use crate::models::{CsvRecord, NewReading, Sensor};
use crate::registry::SensorRegistry;
use crate::store::DynStore;

// ---

#[derive(Clone)]
pub struct IngestionEngine {
    store: DynStore,
    registry: SensorRegistry,
}

impl IngestionEngine {
    // ---
    pub fn new(store: DynStore, registry: SensorRegistry) -> Self {
        Self { store, registry }
    }

    /// Stage every record whose `(sensor_id, timestamp)` is not stored yet
    /// and commit them in one batch. Returns the number staged.
    ///
    /// Duplicates, both against storage and within `records`, are skipped
    /// silently. Records of unknown or inactive sensors never alert.
    /// Existing rows are never modified.
    pub async fn ingest(&self, records: &[CsvRecord]) -> Result<usize> {
        // ---
        if records.is_empty() {
            return Ok(0);
        }

        let created_at = Local::now().naive_local();
        let mut seen: HashSet<(&str, NaiveDateTime)> = HashSet::new();
        // Threshold lookups are cached per batch; a threshold changed mid-batch
        // may or may not be observed.
        let mut sensors: HashMap<&str, Option<Sensor>> = HashMap::new();
        let mut staged = Vec::new();

        for record in records {
            let key = (record.sensor_id.as_str(), record.timestamp);
            if !seen.insert(key) {
                continue;
            }
            if self
                .store
                .reading_exists(&record.sensor_id, record.timestamp)
                .await?
            {
                continue;
            }

            let sensor = match sensors.get(record.sensor_id.as_str()) {
                Some(cached) => cached.clone(),
                None => {
                    let resolved = self.registry.resolve_active(&record.sensor_id).await?;
                    sensors.insert(record.sensor_id.as_str(), resolved.clone());
                    resolved
                }
            };

            let is_alert = sensor.as_ref().is_some_and(|s| s.is_alert(record.value));
            if let Some(sensor) = sensor.as_ref().filter(|_| is_alert) {
                tracing::warn!(
                    sensor_id = %record.sensor_id,
                    value = record.value,
                    threshold = sensor.threshold,
                    "Alert: value exceeds threshold"
                );
            }

            staged.push(NewReading {
                timestamp: record.timestamp,
                sensor_id: record.sensor_id.clone(),
                value: record.value,
                unit: record.unit.clone(),
                is_alert,
                created_at,
            });
        }

        let written = self.store.insert_readings(&staged).await?;
        if written as usize != staged.len() {
            tracing::warn!(
                staged = staged.len(),
                written,
                "Some readings were already stored by a concurrent ingest"
            );
        }

        tracing::info!(new_records = staged.len(), "Saved new records");
        Ok(staged.len())
    }
}
