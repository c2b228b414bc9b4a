//! In-process [`SensorStore`] used by tests and database-less runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use super::SensorStore;
use crate::error::Result;
use crate::models::{NewReading, Reading, Sensor};

// ---

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sensors: HashMap<String, Sensor>,
    readings: BTreeMap<i64, Reading>,
    // Dedup key index, plays the role of the unique index in PostgreSQL.
    by_key: BTreeMap<(String, NaiveDateTime), i64>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn newest_first(&self, keep: impl Fn(&Reading) -> bool) -> Vec<Reading> {
        // ---
        let mut out: Vec<Reading> = self.readings.values().filter(|r| keep(r)).cloned().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        out
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    // ---
    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>> {
        Ok(self.inner.read().await.sensors.get(sensor_id).cloned())
    }

    async fn insert_sensor(&self, sensor: &Sensor) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        inner
            .sensors
            .entry(sensor.sensor_id.clone())
            .or_insert_with(|| sensor.clone());
        Ok(())
    }

    async fn update_sensor_metadata(
        &self,
        sensor_id: &str,
        unit: &str,
        description: Option<&str>,
    ) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.sensors.get_mut(sensor_id) {
            existing.unit = unit.to_string();
            if let Some(description) = description {
                existing.description = Some(description.to_string());
            }
        }
        Ok(())
    }

    async fn update_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool> {
        // ---
        let mut inner = self.inner.write().await;
        match inner.sensors.get_mut(sensor_id) {
            Some(existing) => {
                existing.threshold = threshold;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_sensors(&self) -> Result<Vec<Sensor>> {
        // ---
        let inner = self.inner.read().await;
        let mut sensors: Vec<Sensor> = inner.sensors.values().filter(|s| s.is_active).cloned().collect();
        sensors.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
        Ok(sensors)
    }

    async fn reading_exists(&self, sensor_id: &str, timestamp: NaiveDateTime) -> Result<bool> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner.by_key.contains_key(&(sensor_id.to_string(), timestamp)))
    }

    async fn insert_readings(&self, readings: &[NewReading]) -> Result<u64> {
        // ---
        let mut inner = self.inner.write().await;
        let mut written = 0;

        for new in readings {
            let key = (new.sensor_id.clone(), new.timestamp);
            if inner.by_key.contains_key(&key) {
                continue;
            }

            inner.next_id += 1;
            let id = inner.next_id;
            inner.by_key.insert(key, id);
            inner.readings.insert(
                id,
                Reading {
                    id,
                    timestamp: new.timestamp,
                    sensor_id: new.sensor_id.clone(),
                    value: new.value,
                    unit: new.unit.clone(),
                    is_alert: new.is_alert,
                    created_at: new.created_at,
                },
            );
            written += 1;
        }

        Ok(written)
    }

    async fn readings_for_sensor(&self, sensor_id: &str) -> Result<Vec<Reading>> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .readings
            .values()
            .filter(|r| r.sensor_id == sensor_id)
            .cloned()
            .collect())
    }

    async fn update_alert_flags(&self, updates: &[(i64, bool)]) -> Result<u64> {
        // ---
        let mut inner = self.inner.write().await;
        let mut updated = 0;

        for (id, is_alert) in updates {
            if let Some(reading) = inner.readings.get_mut(id) {
                reading.is_alert = *is_alert;
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn latest_readings(&self, limit: Option<i64>) -> Result<Vec<Reading>> {
        // ---
        let inner = self.inner.read().await;
        let mut readings = inner.newest_first(|_| true);
        if let Some(limit) = limit {
            readings.truncate(limit.max(0) as usize);
        }
        Ok(readings)
    }

    async fn any_alert_since(&self, since: NaiveDateTime) -> Result<bool> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .readings
            .values()
            .any(|r| r.is_alert && r.timestamp >= since))
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Reading>> {
        // ---
        let inner = self.inner.read().await;
        let mut readings = inner.newest_first(|r| r.is_alert);
        readings.truncate(limit.max(0) as usize);
        Ok(readings)
    }
}
