//! End-to-end pipeline behaviour over the in-memory store.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use sensor_ingest::csv_parser;
use sensor_ingest::store::{MemoryStore, SensorStore};
use sensor_ingest::{CsvRecord, Pipeline, Sensor};

// ---

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
}

fn record(timestamp: &str, sensor_id: &str, value: f64, unit: &str) -> CsvRecord {
    CsvRecord {
        timestamp: ts(timestamp),
        sensor_id: sensor_id.to_string(),
        value,
        unit: unit.to_string(),
    }
}

fn setup() -> (Arc<MemoryStore>, Pipeline) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), Pipeline::new(store))
}

#[tokio::test]
async fn duplicate_row_in_batch_is_deduplicated() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    pipeline.registry().upsert("T1", "C", None).await?;

    let batch = [
        record("2024-01-01T00:00:00", "T1", 95.0, "C"),
        record("2024-01-01T00:00:00", "T1", 95.0, "C"),
    ];
    let new = pipeline.engine().ingest(&batch).await?;

    assert_eq!(new, 1);
    let stored = store.readings_for_sensor("T1").await?;
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_alert);
    Ok(())
}

#[tokio::test]
async fn threshold_change_flips_historical_alerts() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    pipeline.registry().upsert("T1", "C", None).await?;

    let new = pipeline
        .engine()
        .ingest(&[record("2024-01-01T00:05:00", "T1", 150.0, "C")])
        .await?;
    assert_eq!(new, 1);
    assert!(store.readings_for_sensor("T1").await?[0].is_alert);

    assert!(pipeline.set_threshold("T1", 200.0).await?);
    assert!(!store.readings_for_sensor("T1").await?[0].is_alert);

    assert!(pipeline.set_threshold("T1", 120.0).await?);
    assert!(store.readings_for_sensor("T1").await?[0].is_alert);
    Ok(())
}

#[tokio::test]
async fn threshold_change_touches_only_that_sensor() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    pipeline
        .import(&[
            record("2024-01-01T00:00:00", "T1", 150.0, "C"),
            record("2024-01-01T00:00:00", "T2", 150.0, "C"),
        ])
        .await?;

    assert!(pipeline.set_threshold("T1", 500.0).await?);

    assert!(!store.readings_for_sensor("T1").await?[0].is_alert);
    assert!(store.readings_for_sensor("T2").await?[0].is_alert);
    Ok(())
}

#[tokio::test]
async fn set_threshold_on_unknown_sensor_mutates_nothing() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    pipeline
        .import(&[record("2024-01-01T00:00:00", "T1", 150.0, "C")])
        .await?;
    let before = store.latest_readings(None).await?;

    assert!(!pipeline.set_threshold("NOPE", 1.0).await?);

    assert_eq!(store.latest_readings(None).await?, before);
    assert!(store.find_sensor("NOPE").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn reimport_is_idempotent() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    let csv = "\
Timestamp,SensorId,Value,Unit
2024-01-01T00:00:00,T1,95,C
2024-01-01T00:05:00,T1,150,C
2024-01-01T00:00:00,H1,55,%
";
    let records = csv_parser::parse(csv.as_bytes())?;

    let first = pipeline.import(&records).await?;
    assert_eq!(first.total_records, 3);
    assert_eq!(first.new_records, 3);
    let snapshot = store.latest_readings(None).await?;

    let second = pipeline.import(&records).await?;
    assert_eq!(second.total_records, 3);
    assert_eq!(second.new_records, 0);
    assert_eq!(store.latest_readings(None).await?, snapshot);
    Ok(())
}

#[tokio::test]
async fn import_registers_sensors_with_first_unit() -> Result<()> {
    // ---
    let (_, pipeline) = setup();
    pipeline
        .import(&[
            record("2024-01-01T00:00:00", "T1", 1.0, "C"),
            record("2024-01-01T00:01:00", "T1", 1.0, "F"),
            record("2024-01-01T00:00:00", "P7", 1.0, "kPa"),
        ])
        .await?;

    let sensors = pipeline.active_sensors().await?;
    let ids: Vec<_> = sensors.iter().map(|s| s.sensor_id.as_str()).collect();
    assert_eq!(ids, vec!["P7", "T1"]);

    let t1 = pipeline.registry().resolve_any("T1").await?.unwrap();
    assert_eq!(t1.unit, "C");
    assert_eq!(t1.threshold, 100.0);
    Ok(())
}

#[tokio::test]
async fn alert_flag_matches_threshold_at_ingest() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    pipeline.registry().upsert("T1", "C", None).await?;
    pipeline.set_threshold("T1", 50.0).await?;

    let values = [10.0, 49.9, 50.0, 50.1, 80.0];
    let batch: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, v)| record(&format!("2024-01-01T00:0{i}:00"), "T1", *v, "C"))
        .collect();
    pipeline.engine().ingest(&batch).await?;

    for reading in store.readings_for_sensor("T1").await? {
        assert_eq!(reading.is_alert, reading.value > 50.0, "value {}", reading.value);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_and_inactive_sensors_never_alert() -> Result<()> {
    // ---
    let (store, pipeline) = setup();
    let mut sensor = Sensor::new("OFF", "C", None);
    sensor.is_active = false;
    store.insert_sensor(&sensor).await?;

    pipeline
        .engine()
        .ingest(&[
            record("2024-01-01T00:00:00", "OFF", 1_000.0, "C"),
            record("2024-01-01T00:00:00", "GHOST", 1_000.0, "C"),
        ])
        .await?;

    assert!(!store.readings_for_sensor("OFF").await?[0].is_alert);
    assert!(!store.readings_for_sensor("GHOST").await?[0].is_alert);
    Ok(())
}

#[tokio::test]
async fn alert_status_keeps_window_asymmetry() -> Result<()> {
    // ---
    let (_, pipeline) = setup();
    // Old alert: listed, but outside the one-hour window.
    pipeline
        .import(&[record("2024-01-01T00:00:00", "T1", 150.0, "C")])
        .await?;

    let status = pipeline.alert_status().await?;
    assert!(!status.has_alerts);
    assert_eq!(status.alert_count, 1);
    assert_eq!(status.alerts.len(), 1);

    let recent = chrono::Local::now().naive_local() - chrono::Duration::minutes(5);
    pipeline
        .import(&[CsvRecord {
            timestamp: recent,
            sensor_id: "T1".to_string(),
            value: 150.0,
            unit: "C".to_string(),
        }])
        .await?;

    let status = pipeline.alert_status().await?;
    assert!(status.has_alerts);
    assert_eq!(status.alert_count, 2);
    assert_eq!(status.alerts[0].timestamp, recent);
    Ok(())
}

#[tokio::test]
async fn alert_list_is_capped() -> Result<()> {
    // ---
    let (_, pipeline) = setup();
    let start = ts("2024-01-01T00:00:00");
    let batch: Vec<_> = (0..120)
        .map(|i| CsvRecord {
            timestamp: start + chrono::Duration::minutes(i),
            sensor_id: "T1".to_string(),
            value: 500.0,
            unit: "C".to_string(),
        })
        .collect();
    pipeline.import(&batch).await?;

    let status = pipeline.alert_status().await?;
    assert_eq!(status.alert_count, 100);
    assert_eq!(status.alerts.len(), 50);
    assert_eq!(status.alerts[0].timestamp, start + chrono::Duration::minutes(119));
    Ok(())
}
