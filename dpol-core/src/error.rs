//! Error types for dpol-core.

use thiserror::Error;

/// Result type alias for dpol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for dpol operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognised polarization label or other malformed identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Columnar data whose lengths disagree.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
