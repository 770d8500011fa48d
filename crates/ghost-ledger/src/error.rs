//! Ledger error types.

use ghost_core::{CommitmentHash, CoreError, Pubkey};
use thiserror::Error;

/// Raw account bytes did not match the schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Field {field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Capacity exceeded: account holds at most {max} commitments")]
    CapacityExceeded { max: usize },

    #[error("Commitment already present: {0}")]
    DuplicateHash(CommitmentHash),

    #[error("Commitment not found: {0}")]
    HashNotFound(CommitmentHash),

    #[error("Account is not delegated")]
    NotDelegated,

    #[error("Account is delegated; owner-side changes are locked")]
    Delegated,

    #[error("No nullifier account for owner {0}")]
    AccountNotFound(Pubkey),

    #[error("Nullifier account already initialized for owner {0}")]
    AlreadyInitialized(Pubkey),

    #[error("Signer is not the account owner")]
    Unauthorized,

    #[error("Executor {0} is not authorized for this account")]
    ExecutorNotAuthorized(Pubkey),

    #[error("Account already authorizes {max} executors")]
    MaxExecutorsReached { max: usize },

    #[error("Account layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Order expired")]
    Expired,

    #[error("Trigger not met: price {current}, trigger {trigger}")]
    TriggerNotMet { current: u64, trigger: u64 },

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Order encoding error: {0}")]
    Core(#[from] CoreError),
}

impl LedgerError {
    /// Transport failures may succeed on a later attempt; state violations never do.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Submission(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
