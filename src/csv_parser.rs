//! CSV parser for sensor readings.
//!
//! Sources are UTF-8 text with a header row followed by four positional
//! columns: timestamp, sensor ID, value, unit. Header names are not
//! interpreted. Any malformed row rejects the whole source.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{PipelineError, Result};
use crate::models::{CsvRecord, MAX_SENSOR_ID_LEN, MAX_UNIT_LEN};

// ---

const COLUMN_COUNT: usize = 4;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a whole CSV stream into an ordered, fully materialized list.
pub fn parse<R: Read>(reader: R) -> Result<Vec<CsvRecord>> {
    // ---
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| PipelineError::Parse(format!("unreadable header: {e}")))?
        .clone();

    // A completely empty source has no header and no rows.
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if headers.len() < COLUMN_COUNT {
        return Err(PipelineError::Parse(format!(
            "header has {} columns, expected {COLUMN_COUNT}",
            headers.len()
        )));
    }

    let mut records = Vec::new();
    for row in csv.records() {
        let row = row.map_err(|e| PipelineError::Parse(e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        records.push(parse_row(&row, line)?);
    }

    Ok(records)
}

/// Parse an in-memory CSV payload, such as an uploaded file.
pub fn parse_bytes(bytes: &[u8]) -> Result<Vec<CsvRecord>> {
    // ---
    let records = parse(bytes)?;
    tracing::info!(records = records.len(), "Read records from uploaded file");
    Ok(records)
}

/// Read and parse a CSV file from disk.
///
/// Returns [`PipelineError::NotFound`] if the path does not exist.
pub async fn parse_file(path: &Path) -> Result<Vec<CsvRecord>> {
    // ---
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::NotFound(format!("file {}", path.display())));
        }
        Err(e) => {
            return Err(PipelineError::Parse(format!(
                "unreadable file {}: {e}",
                path.display()
            )));
        }
    };

    let records = parse(bytes.as_slice())?;
    tracing::info!(
        records = records.len(),
        path = %path.display(),
        "Read records from file"
    );
    Ok(records)
}

fn parse_row(row: &StringRecord, line: u64) -> Result<CsvRecord> {
    // ---
    if row.len() < COLUMN_COUNT {
        return Err(row_error(
            line,
            format!("expected {COLUMN_COUNT} columns, found {}", row.len()),
        ));
    }

    let timestamp = parse_timestamp(&row[0])
        .ok_or_else(|| row_error(line, format!("invalid timestamp '{}'", &row[0])))?;

    let sensor_id = &row[1];
    if sensor_id.is_empty() {
        return Err(row_error(line, "empty sensor ID".to_string()));
    }
    if sensor_id.chars().count() > MAX_SENSOR_ID_LEN {
        return Err(row_error(
            line,
            format!("sensor ID '{sensor_id}' longer than {MAX_SENSOR_ID_LEN} characters"),
        ));
    }

    let value = row[2]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| row_error(line, format!("invalid value '{}'", &row[2])))?;

    let unit = &row[3];
    if unit.chars().count() > MAX_UNIT_LEN {
        return Err(row_error(
            line,
            format!("unit '{unit}' longer than {MAX_UNIT_LEN} characters"),
        ));
    }

    Ok(CsvRecord {
        timestamp,
        sensor_id: sensor_id.to_string(),
        value,
        unit: unit.to_string(),
    })
}

/// Accepts ISO-8601 style date-times with or without an offset.
///
/// An offset, if present, is dropped and the wall-clock time kept.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    // ---
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

fn row_error(line: u64, message: String) -> PipelineError {
    PipelineError::Parse(format!("line {line}: {message}"))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{NaiveDate, Timelike};

    const VALID: &str = "\
Timestamp,SensorId,Value,Unit
2024-01-01T00:00:00,T1,95,C
2024-01-01 00:05:00,T1,150.5,C
2024-01-01T00:10:00Z,H2,40,%
";

    #[test]
    fn test_parses_rows_in_order() {
        // ---
        let records = parse(VALID.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sensor_id, "T1");
        assert_eq!(records[0].value, 95.0);
        assert_eq!(
            records[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(records[1].value, 150.5);
        assert_eq!(records[1].timestamp.minute(), 5);
        assert_eq!(records[2].sensor_id, "H2");
        assert_eq!(records[2].unit, "%");
    }

    #[test]
    fn test_offset_is_dropped_not_normalized() {
        // ---
        let csv = "ts,id,v,u\n2024-01-01T10:00:00+02:00,T1,1,C\n";
        let records = parse(csv.as_bytes()).unwrap();
        assert_eq!(records[0].timestamp.hour(), 10);
    }

    #[test]
    fn test_fields_are_trimmed() {
        // ---
        let csv = "ts,id,v,u\n 2024-01-01T00:00:00 , T1 , 7 , C \n";
        let records = parse(csv.as_bytes()).unwrap();
        assert_eq!(records[0].sensor_id, "T1");
        assert_eq!(records[0].value, 7.0);
        assert_eq!(records[0].unit, "C");
    }

    #[test]
    fn test_header_only_yields_nothing() {
        // ---
        let records = parse("Timestamp,SensorId,Value,Unit\n".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        // ---
        let records = parse("".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bad_value_rejects_whole_source() {
        // ---
        let csv = "ts,id,v,u\n2024-01-01T00:00:00,T1,1,C\n2024-01-01T00:01:00,T1,abc,C\n";
        let err = parse(csv.as_bytes()).unwrap_err();

        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().contains("line 3"), "got: {err}");
    }

    #[test]
    fn test_non_finite_value_rejected() {
        // ---
        let csv = "ts,id,v,u\n2024-01-01T00:00:00,T1,NaN,C\n";
        assert!(matches!(parse(csv.as_bytes()), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        // ---
        let csv = "ts,id,v,u\nyesterday,T1,1,C\n";
        assert!(matches!(parse(csv.as_bytes()), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_missing_columns_rejected() {
        // ---
        let short_row = "ts,id,v,u\n2024-01-01T00:00:00,T1,1\n";
        assert!(matches!(parse(short_row.as_bytes()), Err(PipelineError::Parse(_))));

        let short_header = "ts,id,v\n2024-01-01T00:00:00,T1,1\n";
        assert!(matches!(parse(short_header.as_bytes()), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_field_limits() {
        // ---
        let long_id = "ts,id,v,u\n2024-01-01T00:00:00,ABCDEFGHIJKLMNOPQRSTU,1,C\n";
        assert!(matches!(parse(long_id.as_bytes()), Err(PipelineError::Parse(_))));

        let long_unit = "ts,id,v,u\n2024-01-01T00:00:00,T1,1,kilopascals\n";
        assert!(matches!(parse(long_unit.as_bytes()), Err(PipelineError::Parse(_))));

        let empty_id = "ts,id,v,u\n2024-01-01T00:00:00,,1,C\n";
        assert!(matches!(parse(empty_id.as_bytes()), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        // ---
        let bytes: &[u8] = b"ts,id,v,u\n2024-01-01T00:00:00,T\xff1,1,C\n";
        assert!(matches!(parse(bytes), Err(PipelineError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(&dir.path().join("absent.csv")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_parse_file_reads_disk() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, VALID).unwrap();

        let records = parse_file(&path).await.unwrap();
        assert_eq!(records.len(), 3);
    }
}
