//! Error types for ghost-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An order field does not fit its declared wire width or range.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A fixed-width identifier was not valid hex of the right length.
    #[error("Invalid {kind}: {reason}")]
    InvalidHex {
        /// Identifier kind (e.g. "commitment hash").
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
