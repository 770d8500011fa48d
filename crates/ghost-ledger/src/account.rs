//! Nullifier account state machine.
//!
//! ```text
//! (absent) --initialize--> Active(delegated=false) <--delegate/undelegate--> Active(delegated=true)
//! ```
//!
//! Hash slots are kept compact: active hashes occupy `[0..count)` in
//! insertion order and every slot past `count` is zero. The authorized
//! executor list follows the same rule.

use ghost_core::{CommitmentHash, Pubkey};

use crate::error::{LedgerError, LedgerResult};

/// Hard per-account ceiling on outstanding commitments.
pub const MAX_COMMITMENTS: usize = 16;

/// Executors the owner may authorize to consume commitments.
pub const MAX_EXECUTORS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullifierAccount {
    pub owner: Pubkey,
    /// Total commitments ever added. Never decremented.
    pub order_counter: u64,
    pub delegated: bool,
    pub bump: u8,
    hashes: [CommitmentHash; MAX_COMMITMENTS],
    count: u8,
    executors: [Pubkey; MAX_EXECUTORS],
    executor_count: u8,
}

impl NullifierAccount {
    #[must_use]
    pub fn initialize(owner: Pubkey, bump: u8) -> Self {
        Self {
            owner,
            order_counter: 0,
            delegated: false,
            bump,
            hashes: [CommitmentHash::default(); MAX_COMMITMENTS],
            count: 0,
            executors: [Pubkey::default(); MAX_EXECUTORS],
            executor_count: 0,
        }
    }

    /// Rebuild from already-validated layout fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        owner: Pubkey,
        order_counter: u64,
        delegated: bool,
        bump: u8,
        hashes: [CommitmentHash; MAX_COMMITMENTS],
        count: u8,
        executors: [Pubkey; MAX_EXECUTORS],
        executor_count: u8,
    ) -> Self {
        Self {
            owner,
            order_counter,
            delegated,
            bump,
            hashes,
            count,
            executors,
            executor_count,
        }
    }

    pub(crate) fn raw_slots(&self) -> &[CommitmentHash; MAX_COMMITMENTS] {
        &self.hashes
    }

    pub(crate) fn raw_executor_slots(&self) -> &[Pubkey; MAX_EXECUTORS] {
        &self.executors
    }

    pub fn delegate(&mut self) {
        self.delegated = true;
    }

    pub fn undelegate(&mut self) {
        self.delegated = false;
    }

    /// Append a commitment.
    ///
    /// # Errors
    /// `CapacityExceeded` when all 16 slots are used, `DuplicateHash` if the
    /// hash is already outstanding.
    pub fn add_hash(&mut self, hash: CommitmentHash) -> LedgerResult<()> {
        if self.count() >= MAX_COMMITMENTS {
            return Err(LedgerError::CapacityExceeded {
                max: MAX_COMMITMENTS,
            });
        }
        if self.has_hash(&hash) {
            return Err(LedgerError::DuplicateHash(hash));
        }

        self.hashes[self.count()] = hash;
        self.count += 1;
        self.order_counter += 1;
        Ok(())
    }

    /// Executor-side removal: consumes the nullifier.
    ///
    /// # Errors
    /// `NotDelegated` unless the account is delegated, `HashNotFound` if absent.
    pub fn remove_hash(&mut self, hash: &CommitmentHash) -> LedgerResult<()> {
        if !self.delegated {
            return Err(LedgerError::NotDelegated);
        }
        self.remove_present(hash)
    }

    /// Owner-side removal of an unexecuted order.
    ///
    /// # Errors
    /// `Delegated` while the executor runtime controls the account,
    /// `HashNotFound` if absent.
    pub fn cancel_hash(&mut self, hash: &CommitmentHash) -> LedgerResult<()> {
        if self.delegated {
            return Err(LedgerError::Delegated);
        }
        self.remove_present(hash)
    }

    fn remove_present(&mut self, hash: &CommitmentHash) -> LedgerResult<()> {
        let idx = self
            .hashes()
            .iter()
            .position(|h| h == hash)
            .ok_or(LedgerError::HashNotFound(*hash))?;

        let count = self.count();
        self.hashes.copy_within(idx + 1..count, idx);
        self.hashes[count - 1] = CommitmentHash::default();
        self.count -= 1;
        Ok(())
    }

    /// Allow `executor` to consume this account's commitments. Idempotent.
    ///
    /// # Errors
    /// `MaxExecutorsReached` when all four slots are taken by others.
    pub fn authorize_executor(&mut self, executor: Pubkey) -> LedgerResult<()> {
        if self.is_authorized_executor(&executor) {
            return Ok(());
        }
        if self.executors().len() >= MAX_EXECUTORS {
            return Err(LedgerError::MaxExecutorsReached { max: MAX_EXECUTORS });
        }
        self.executors[self.executors().len()] = executor;
        self.executor_count += 1;
        Ok(())
    }

    /// Revoke `executor`. Revoking an unknown key is a no-op.
    pub fn revoke_executor(&mut self, executor: &Pubkey) {
        let Some(idx) = self.executors().iter().position(|e| e == executor) else {
            return;
        };
        let count = self.executors().len();
        self.executors.copy_within(idx + 1..count, idx);
        self.executors[count - 1] = Pubkey::default();
        self.executor_count -= 1;
    }

    #[must_use]
    pub fn is_authorized_executor(&self, executor: &Pubkey) -> bool {
        self.executors().contains(executor)
    }

    /// The owner or an authorized executor may consume commitments.
    #[must_use]
    pub fn may_execute(&self, signer: &Pubkey) -> bool {
        *signer == self.owner || self.is_authorized_executor(signer)
    }

    #[must_use]
    pub fn executors(&self) -> &[Pubkey] {
        &self.executors[..usize::from(self.executor_count)]
    }

    #[must_use]
    pub fn has_hash(&self, hash: &CommitmentHash) -> bool {
        self.hashes().contains(hash)
    }

    /// Active hashes in insertion order.
    #[must_use]
    pub fn hashes(&self) -> &[CommitmentHash] {
        &self.hashes[..self.count()]
    }

    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() == MAX_COMMITMENTS
    }
}
