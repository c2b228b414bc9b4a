//! Persistence interface consumed by the pipeline.
//!
//! Sensors are keyed by their business ID; readings carry that ID as a plain
//! reference and are looked up through it, never through a back-pointer.
//! Writes are last-write-wins with no concurrency tokens. Sensor updates
//! touch only the columns they own, so metadata and threshold writes do not
//! clobber each other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::{NewReading, Reading, Sensor};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Shared handle to whichever backend the process runs on.
pub type DynStore = Arc<dyn SensorStore>;

#[async_trait]
pub trait SensorStore: Send + Sync {
    // ---
    /// Look up a sensor by ID, active or not.
    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>>;

    async fn insert_sensor(&self, sensor: &Sensor) -> Result<()>;

    /// Set the unit of an existing sensor, and its description when one is given.
    ///
    /// Threshold and active flag are left as stored.
    async fn update_sensor_metadata(
        &self,
        sensor_id: &str,
        unit: &str,
        description: Option<&str>,
    ) -> Result<()>;

    /// Set the threshold of an existing sensor. Returns `false` if there is none.
    async fn update_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool>;

    async fn active_sensors(&self) -> Result<Vec<Sensor>>;

    /// Whether a reading with this dedup key is already stored.
    async fn reading_exists(&self, sensor_id: &str, timestamp: NaiveDateTime) -> Result<bool>;

    /// Commit a batch of new readings as one unit.
    ///
    /// Rows whose dedup key is already taken are skipped by the store.
    /// Returns the number of rows actually written.
    async fn insert_readings(&self, readings: &[NewReading]) -> Result<u64>;

    async fn readings_for_sensor(&self, sensor_id: &str) -> Result<Vec<Reading>>;

    /// Set the alert flag of each `(reading id, is_alert)` pair as one unit.
    async fn update_alert_flags(&self, updates: &[(i64, bool)]) -> Result<u64>;

    /// Most recent readings by timestamp, newest first. `None` means unbounded.
    async fn latest_readings(&self, limit: Option<i64>) -> Result<Vec<Reading>>;

    async fn any_alert_since(&self, since: NaiveDateTime) -> Result<bool>;

    /// Most recent alerted readings by timestamp, newest first.
    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Reading>>;
}
