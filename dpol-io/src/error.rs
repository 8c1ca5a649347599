//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A data folder or file that was required is absent.
    #[error("missing data: {}", .0.display())]
    MissingData(PathBuf),

    /// Invalid reader configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
