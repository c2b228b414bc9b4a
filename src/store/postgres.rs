//! PostgreSQL implementation of [`SensorStore`] on a `sqlx` pool.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use super::SensorStore;
use crate::error::Result;
use crate::models::{NewReading, Reading, Sensor};

// ---

const READING_COLUMNS: &str = "id, timestamp, sensor_id, value, unit, is_alert, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SensorStore for PgStore {
    // ---
    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>> {
        // ---
        let sensor = sqlx::query_as::<_, Sensor>(
            r#"
            SELECT sensor_id, threshold, unit, description, is_active
            FROM sensors
            WHERE sensor_id = $1
            "#,
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sensor)
    }

    async fn insert_sensor(&self, sensor: &Sensor) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO sensors (sensor_id, threshold, unit, description, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sensor_id) DO NOTHING
            "#,
        )
        .bind(&sensor.sensor_id)
        .bind(sensor.threshold)
        .bind(&sensor.unit)
        .bind(&sensor.description)
        .bind(sensor.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_sensor_metadata(
        &self,
        sensor_id: &str,
        unit: &str,
        description: Option<&str>,
    ) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            UPDATE sensors
            SET unit = $2, description = COALESCE($3, description)
            WHERE sensor_id = $1
            "#,
        )
        .bind(sensor_id)
        .bind(unit)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_threshold(&self, sensor_id: &str, threshold: f64) -> Result<bool> {
        // ---
        let result = sqlx::query("UPDATE sensors SET threshold = $2 WHERE sensor_id = $1")
            .bind(sensor_id)
            .bind(threshold)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active_sensors(&self) -> Result<Vec<Sensor>> {
        // ---
        let sensors = sqlx::query_as::<_, Sensor>(
            r#"
            SELECT sensor_id, threshold, unit, description, is_active
            FROM sensors
            WHERE is_active
            ORDER BY sensor_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sensors)
    }

    async fn reading_exists(&self, sensor_id: &str, timestamp: NaiveDateTime) -> Result<bool> {
        // ---
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM sensor_data WHERE sensor_id = $1 AND timestamp = $2
            )
            "#,
        )
        .bind(sensor_id)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_readings(&self, readings: &[NewReading]) -> Result<u64> {
        // ---
        if readings.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for reading in readings {
            let result = sqlx::query(
                r#"
                INSERT INTO sensor_data (
                    timestamp, sensor_id, value, unit, is_alert, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (sensor_id, timestamp) DO NOTHING
                "#,
            )
            .bind(reading.timestamp)
            .bind(&reading.sensor_id)
            .bind(reading.value)
            .bind(&reading.unit)
            .bind(reading.is_alert)
            .bind(reading.created_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn readings_for_sensor(&self, sensor_id: &str) -> Result<Vec<Reading>> {
        // ---
        let sql = format!("SELECT {READING_COLUMNS} FROM sensor_data WHERE sensor_id = $1");
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(sensor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }

    async fn update_alert_flags(&self, updates: &[(i64, bool)]) -> Result<u64> {
        // ---
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for (id, is_alert) in updates {
            let result = sqlx::query("UPDATE sensor_data SET is_alert = $2 WHERE id = $1")
                .bind(id)
                .bind(is_alert)
                .execute(&mut *tx)
                .await?;

            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn latest_readings(&self, limit: Option<i64>) -> Result<Vec<Reading>> {
        // ---
        // LIMIT NULL is unbounded in PostgreSQL.
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_data ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }

    async fn any_alert_since(&self, since: NaiveDateTime) -> Result<bool> {
        // ---
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM sensor_data WHERE is_alert AND timestamp >= $1
            )
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_data WHERE is_alert \
             ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(readings)
    }
}
