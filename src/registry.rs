//! Sensor registry: lookup, first-sight creation, and threshold updates.

use crate::error::Result;
use crate::models::{truncate_chars, Sensor, MAX_DESCRIPTION_LEN};
use crate::reevaluate::ThresholdReevaluator;
use crate::store::DynStore;

// ---

#[derive(Clone)]
pub struct SensorRegistry {
    store: DynStore,
    reevaluator: ThresholdReevaluator,
}

impl SensorRegistry {
    // ---
    pub fn new(store: DynStore) -> Self {
        Self {
            reevaluator: ThresholdReevaluator::new(store.clone()),
            store,
        }
    }

    /// The sensor, if it exists and is active. Used for alert thresholds.
    pub async fn resolve_active(&self, sensor_id: &str) -> Result<Option<Sensor>> {
        Ok(self.store.find_sensor(sensor_id).await?.filter(|s| s.is_active))
    }

    /// The sensor regardless of its active flag.
    pub async fn resolve_any(&self, sensor_id: &str) -> Result<Option<Sensor>> {
        self.store.find_sensor(sensor_id).await
    }

    pub async fn active_sensors(&self) -> Result<Vec<Sensor>> {
        self.store.active_sensors().await
    }

    /// Create the sensor on first sight, or refresh its unit and description.
    ///
    /// An existing sensor always takes the new unit; its description only
    /// changes when a non-empty one is supplied. Threshold and active flag
    /// are never touched here.
    pub async fn upsert(
        &self,
        sensor_id: &str,
        unit: &str,
        description: Option<&str>,
    ) -> Result<Sensor> {
        // ---
        if let Some(mut sensor) = self.store.find_sensor(sensor_id).await? {
            let new_description = description
                .filter(|d| !d.is_empty())
                .map(|d| truncate_chars(d, MAX_DESCRIPTION_LEN));

            let changed = sensor.unit != unit
                || new_description
                    .as_ref()
                    .is_some_and(|d| sensor.description.as_ref() != Some(d));

            if changed {
                self.store
                    .update_sensor_metadata(sensor_id, unit, new_description.as_deref())
                    .await?;
                sensor.unit = unit.to_string();
                if let Some(d) = new_description {
                    sensor.description = Some(d);
                }
            }
            return Ok(sensor);
        }

        let sensor = Sensor::new(sensor_id, unit, description);
        self.store.insert_sensor(&sensor).await?;
        tracing::info!(sensor_id, unit, "Created new sensor");

        Ok(sensor)
    }

    /// Change a sensor's threshold and re-evaluate all of its readings.
    ///
    /// Returns `Ok(false)` without touching anything if no sensor with this
    /// ID exists, active or not. The value is not range-checked here.
    pub async fn set_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool> {
        // ---
        if !self.store.update_threshold(sensor_id, threshold).await? {
            tracing::warn!(sensor_id, "Sensor not found for threshold update");
            return Ok(false);
        }

        let reevaluated = self.reevaluator.reevaluate(sensor_id, threshold).await?;

        tracing::info!(
            sensor_id,
            threshold,
            reevaluated,
            "Updated threshold and re-evaluated readings"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::{MemoryStore, SensorStore};
    use std::sync::Arc;

    fn registry() -> (Arc<MemoryStore>, SensorRegistry) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), SensorRegistry::new(store))
    }

    fn inactive(sensor_id: &str) -> Sensor {
        let mut sensor = Sensor::new(sensor_id, "C", None);
        sensor.is_active = false;
        sensor
    }

    #[tokio::test]
    async fn test_upsert_creates_with_defaults() {
        // ---
        let (_, registry) = registry();
        let sensor = registry.upsert("T1", "C", None).await.unwrap();

        assert_eq!(sensor.threshold, 100.0);
        assert!(sensor.is_active);
        assert_eq!(sensor.description.as_deref(), Some("Sensor T1"));
    }

    #[tokio::test]
    async fn test_upsert_updates_unit_and_keeps_threshold() {
        // ---
        let (_, registry) = registry();
        registry.upsert("T1", "C", Some("boiler inlet")).await.unwrap();
        registry.set_threshold("T1", 42.0).await.unwrap();

        let sensor = registry.upsert("T1", "F", None).await.unwrap();
        assert_eq!(sensor.unit, "F");
        assert_eq!(sensor.threshold, 42.0);
        assert_eq!(sensor.description.as_deref(), Some("boiler inlet"));

        let sensor = registry.upsert("T1", "F", Some("")).await.unwrap();
        assert_eq!(sensor.description.as_deref(), Some("boiler inlet"));

        let sensor = registry.upsert("T1", "F", Some("boiler outlet")).await.unwrap();
        assert_eq!(sensor.description.as_deref(), Some("boiler outlet"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        // ---
        let (store, registry) = registry();
        let first = registry.upsert("T1", "C", Some("d")).await.unwrap();
        let second = registry.upsert("T1", "C", Some("d")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.active_sensors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_truncates_long_description() {
        // ---
        let (_, registry) = registry();
        let long = "x".repeat(300);
        let sensor = registry.upsert("T1", "C", Some(&long)).await.unwrap();
        assert_eq!(sensor.description.unwrap().len(), 255);
    }

    #[tokio::test]
    async fn test_resolve_respects_active_flag() {
        // ---
        let (store, registry) = registry();
        store.insert_sensor(&inactive("T1")).await.unwrap();

        assert!(registry.resolve_active("T1").await.unwrap().is_none());
        assert!(registry.resolve_any("T1").await.unwrap().is_some());
        assert!(registry.active_sensors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_threshold_unknown_sensor() {
        // ---
        let (store, registry) = registry();
        assert!(!registry.set_threshold("ghost", 5.0).await.unwrap());
        assert!(store.find_sensor("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_threshold_on_inactive_sensor() {
        // ---
        let (store, registry) = registry();
        store.insert_sensor(&inactive("T1")).await.unwrap();

        assert!(registry.set_threshold("T1", 5.0).await.unwrap());
        assert_eq!(registry.resolve_any("T1").await.unwrap().unwrap().threshold, 5.0);
    }

    /// Store that commits a competing write just before each sensor update,
    /// as a concurrent request would.
    struct InterleavedStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl SensorStore for InterleavedStore {
        // ---
        async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>> {
            self.inner.find_sensor(sensor_id).await
        }

        async fn insert_sensor(&self, sensor: &Sensor) -> Result<()> {
            self.inner.insert_sensor(sensor).await
        }

        async fn update_sensor_metadata(
            &self,
            sensor_id: &str,
            unit: &str,
            description: Option<&str>,
        ) -> Result<()> {
            self.inner.update_threshold(sensor_id, 200.0).await?;
            self.inner.update_sensor_metadata(sensor_id, unit, description).await
        }

        async fn update_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool> {
            self.inner.update_sensor_metadata(sensor_id, "K", None).await?;
            self.inner.update_threshold(sensor_id, threshold).await
        }

        async fn active_sensors(&self) -> Result<Vec<Sensor>> {
            self.inner.active_sensors().await
        }

        async fn reading_exists(
            &self,
            sensor_id: &str,
            timestamp: chrono::NaiveDateTime,
        ) -> Result<bool> {
            self.inner.reading_exists(sensor_id, timestamp).await
        }

        async fn insert_readings(&self, readings: &[crate::models::NewReading]) -> Result<u64> {
            self.inner.insert_readings(readings).await
        }

        async fn readings_for_sensor(&self, sensor_id: &str) -> Result<Vec<crate::models::Reading>> {
            self.inner.readings_for_sensor(sensor_id).await
        }

        async fn update_alert_flags(&self, updates: &[(i64, bool)]) -> Result<u64> {
            self.inner.update_alert_flags(updates).await
        }

        async fn latest_readings(&self, limit: Option<i64>) -> Result<Vec<crate::models::Reading>> {
            self.inner.latest_readings(limit).await
        }

        async fn any_alert_since(&self, since: chrono::NaiveDateTime) -> Result<bool> {
            self.inner.any_alert_since(since).await
        }

        async fn recent_alerts(&self, limit: i64) -> Result<Vec<crate::models::Reading>> {
            self.inner.recent_alerts(limit).await
        }
    }

    fn interleaved() -> (Arc<InterleavedStore>, SensorRegistry) {
        let store = Arc::new(InterleavedStore {
            inner: MemoryStore::new(),
        });
        (store.clone(), SensorRegistry::new(store))
    }

    #[tokio::test]
    async fn test_upsert_keeps_concurrent_threshold() {
        // ---
        let (store, registry) = interleaved();
        registry.upsert("T1", "C", None).await.unwrap();
        registry.upsert("T1", "F", None).await.unwrap();

        let stored = store.find_sensor("T1").await.unwrap().unwrap();
        assert_eq!(stored.unit, "F");
        assert_eq!(stored.threshold, 200.0);
    }

    #[tokio::test]
    async fn test_set_threshold_keeps_concurrent_unit() {
        // ---
        let (store, registry) = interleaved();
        registry.upsert("T1", "C", None).await.unwrap();
        assert!(registry.set_threshold("T1", 50.0).await.unwrap());

        let stored = store.find_sensor("T1").await.unwrap().unwrap();
        assert_eq!(stored.unit, "K");
        assert_eq!(stored.threshold, 50.0);
    }
}
