//! Error taxonomy shared by the ingestion pipeline.
//!
//! Library code returns [`Result<T>`]; the HTTP layer maps each variant onto
//! a status code in `routes::error`, and the folder scanner records it per file.

/// Failures produced by parsing, lookups, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A file, folder, or sensor that was asked for does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or unreadable CSV input. The whole source is rejected.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The storage backend failed or is unavailable.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Filesystem failure outside of reading a single source, such as
    /// listing the scan folder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Short machine-readable tag, used in logs and scan reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Parse(_) => "parse",
            PipelineError::Storage(_) => "storage",
            PipelineError::Io(_) => "io",
        }
    }
}
