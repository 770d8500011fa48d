//! Envelope error types.

use ghost_core::{CommitmentHash, CoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Order encoding error: {0}")]
    Core(#[from] CoreError),

    #[error("Encryption failed")]
    Encryption,

    /// Wrong key, tampered ciphertext or unreadable plaintext.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// The decrypted order does not hash to the envelope's commitment.
    #[error("Commitment mismatch: envelope {expected}, plaintext {actual}")]
    CommitmentMismatch {
        expected: CommitmentHash,
        actual: CommitmentHash,
    },

    #[error("Envelope already stored for commitment {0}")]
    DuplicateHash(CommitmentHash),

    #[error("No envelope for commitment {0}")]
    NotFound(CommitmentHash),

    #[error("Only the order owner may modify this envelope")]
    Unauthorized,

    #[error("Ciphertext too large: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("Key error: {0}")]
    Key(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
