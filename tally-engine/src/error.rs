//! Error types for the engines

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors an engine can report
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input is malformed or missing required fields; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input is valid but empty; a successful-but-empty outcome
    #[error("No data: {0}")]
    NoData(String),

    /// A pluggable strategy returned an unusable result
    #[error("Strategy failed: {0}")]
    Strategy(String),
}

impl EngineError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }
}
