//! Sensor-reading ingestion and threshold alerting.
//!
//! CSV sources (uploads or a periodically scanned folder) are parsed,
//! deduplicated on `(sensor_id, timestamp)`, flagged against each sensor's
//! alert threshold and committed. Changing a threshold re-evaluates every
//! stored reading of that sensor.
//!
//! Module boundaries: `main.rs` only talks to [`config`], [`schema`],
//! [`store`], [`pipeline`], [`scheduler`] and [`routes`].

pub mod config;
pub mod csv_parser;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod reevaluate;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use models::{AlertStatus, CsvRecord, ImportSummary, NewReading, Reading, Sensor};
pub use pipeline::Pipeline;
pub use scheduler::{FileOutcome, FolderScanScheduler, ScanReport, ScanState};
