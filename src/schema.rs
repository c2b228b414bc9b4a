//! Database schema management for `sensor-ingest`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensors` table keyed by the business sensor ID and the
/// `sensor_data` table for readings. Safe to call on every startup.
///
/// Readings reference sensors by `sensor_id` without a foreign-key
/// constraint: a reading for a sensor that is not registered yet is valid.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            sensor_id    VARCHAR(20)      PRIMARY KEY,
            threshold    DOUBLE PRECISION NOT NULL DEFAULT 100.0,
            unit         VARCHAR(10)      NOT NULL,
            description  VARCHAR(255),
            is_active    BOOLEAN          NOT NULL DEFAULT TRUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id          BIGSERIAL        PRIMARY KEY,
            timestamp   TIMESTAMP        NOT NULL,
            sensor_id   VARCHAR(20)      NOT NULL,
            value       DOUBLE PRECISION NOT NULL,
            unit        VARCHAR(10)      NOT NULL,
            is_alert    BOOLEAN          NOT NULL DEFAULT FALSE,
            created_at  TIMESTAMP        NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Dedup key: at most one reading per sensor per timestamp
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_sensor_data_sensor_timestamp
            ON sensor_data (sensor_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
            ON sensor_data (timestamp DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_alert
            ON sensor_data (timestamp DESC) WHERE is_alert;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
