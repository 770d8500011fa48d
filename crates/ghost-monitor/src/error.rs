//! Monitor error types.

use ghost_core::{CommitmentHash, CoreError};
use ghost_envelope::EnvelopeError;
use ghost_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor already running")]
    AlreadyRunning,

    #[error("No executor key configured")]
    MissingCredential,

    #[error("Price fetch failed: {0}")]
    PriceFetch(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Wrong key, tampered ciphertext or a plaintext that does not hash to
    /// the tracked commitment.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("No ciphertext stored for commitment {0}")]
    EnvelopeUnavailable(CommitmentHash),

    #[error("Invalid order: {0}")]
    Encoding(#[from] CoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Transient failures are retried; everything else is surfaced once.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PriceFetch(_)
            | Self::Submission(_)
            | Self::Timeout { .. }
            | Self::EnvelopeUnavailable(_) => true,
            Self::Ledger(e) => e.is_transient(),
            Self::Envelope(e) => matches!(e, EnvelopeError::Io(_)),
            _ => false,
        }
    }

    /// Metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyRunning => "already_running",
            Self::MissingCredential => "missing_credential",
            Self::PriceFetch(_) => "price_fetch",
            Self::Submission(_) => "submission",
            Self::Timeout { .. } => "timeout",
            Self::Decryption(_) => "decryption",
            Self::EnvelopeUnavailable(_) => "envelope_unavailable",
            Self::Encoding(_) => "encoding",
            Self::Ledger(_) => "ledger",
            Self::Envelope(_) => "envelope",
            Self::Config(_) => "config",
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
