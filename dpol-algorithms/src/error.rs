//! Error types for dpol-algorithms.

use thiserror::Error;

/// Result type for algorithm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Algorithm error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry snapshot that cannot be parsed or is missing a required field.
    #[error("invalid geometry snapshot: {0}")]
    InvalidSnapshot(String),

    /// Parameter outside its valid domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] dpol_core::Error),
}
