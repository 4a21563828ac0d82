//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

/// Errors raised while loading or saving template configuration.
/// Pivot calculation itself never fails: bad data degrades to sentinels.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

pub type PivotResult<T> = Result<T, PivotError>;
