//! Error types for dpol-sweep.

use thiserror::Error;

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Sweep error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sweep or survey configuration that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data loading or writing error.
    #[error("data error: {0}")]
    DataError(#[from] dpol_io::Error),

    /// Selection, geometry or statistics error.
    #[error("algorithm error: {0}")]
    AlgorithmError(#[from] dpol_algorithms::Error),
}
