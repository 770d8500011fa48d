//! Order intake.
//!
//! Seals an incoming order to the executor key, stores the ciphertext and
//! registers the commitment in the owner's nullifier account. With
//! delegation requested it also authorizes the executor key on the account
//! and hands the account to the executor runtime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ghost_core::{CommitmentHash, Order, Pubkey, TxSignature};
use ghost_envelope::{random_salt, seal, EncryptedEnvelope, EnvelopeStore, ExecutorPublicKey};
use ghost_ledger::{
    derive_account_address, fetch_nullifier_account, DynLedgerClient, LedgerInstruction,
    LedgerResult,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{MonitorError, MonitorResult};

/// Result of a successful intake.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReceipt {
    pub commitment: CommitmentHash,
    pub envelope: EncryptedEnvelope,
    pub create_signature: TxSignature,
    /// Set when this intake authorized the executor on the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_signature: Option<TxSignature>,
    /// Set when this intake delegated the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate_signature: Option<TxSignature>,
    pub delegated: bool,
}

pub struct OrderIntake {
    executor_key: ExecutorPublicKey,
    store: Arc<EnvelopeStore>,
    ledger: DynLedgerClient,
    timeout: Duration,
}

impl OrderIntake {
    #[must_use]
    pub fn new(
        executor_key: ExecutorPublicKey,
        store: Arc<EnvelopeStore>,
        ledger: DynLedgerClient,
        timeout: Duration,
    ) -> Self {
        Self {
            executor_key,
            store,
            ledger,
            timeout,
        }
    }

    #[must_use]
    pub fn executor_key(&self) -> ExecutorPublicKey {
        self.executor_key
    }

    #[must_use]
    pub fn store(&self) -> &Arc<EnvelopeStore> {
        &self.store
    }

    /// Seal, store and register an order.
    ///
    /// A missing salt is filled with fresh random bytes. If the ledger
    /// rejects the commitment the stored ciphertext is removed again.
    ///
    /// # Errors
    /// `Encoding` for malformed fields, `Envelope(DuplicateHash)` if the
    /// commitment is already stored, `Ledger(..)` if the account rejects it.
    pub async fn submit(&self, mut order: Order, delegate: bool) -> MonitorResult<IntakeReceipt> {
        order.validate()?;
        if order.salt.is_none() {
            order.salt = Some(random_salt());
        }

        let envelope = seal(&order, &self.executor_key)?;
        let commitment = envelope.commitment;
        let owner = order.owner;
        self.store.insert(envelope.clone())?;

        let program_id = self.ledger.program_id();
        let (address, _) = derive_account_address(&program_id, &owner);

        let create = LedgerInstruction::CreateEncryptedOrder { commitment }
            .into_instruction(program_id, address, owner);
        let create_signature = match self.timed(self.ledger.submit(create)).await {
            Ok(sig) => sig,
            Err(e) => {
                if let Err(rollback) = self.store.delete(&commitment, &owner) {
                    warn!(error = %rollback, "Failed to roll back stored envelope");
                }
                return Err(e);
            }
        };

        info!(
            owner = %owner.short(),
            commitment = %commitment.short(),
            signature = %create_signature,
            "Encrypted order registered"
        );

        let mut receipt = IntakeReceipt {
            commitment,
            envelope,
            create_signature,
            authorize_signature: None,
            delegate_signature: None,
            delegated: false,
        };

        if delegate {
            // The commitment is registered; the owner can delegate later
            if let Err(e) = self.hand_to_executor(owner, &mut receipt).await {
                warn!(owner = %owner.short(), error = %e, "Delegation failed");
            }
        }

        Ok(receipt)
    }

    /// Authorize the executor key and delegate, skipping whatever the
    /// account already has.
    async fn hand_to_executor(&self, owner: Pubkey, receipt: &mut IntakeReceipt) -> MonitorResult<()> {
        let program_id = self.ledger.program_id();
        let (address, _) = derive_account_address(&program_id, &owner);
        let executor = Pubkey::new(*self.executor_key.as_bytes());

        let account = self
            .timed(fetch_nullifier_account(self.ledger.as_ref(), &owner))
            .await?;
        let (authorized, delegated) = account.map_or((false, false), |a| {
            (a.is_authorized_executor(&executor), a.delegated)
        });

        if !authorized {
            let ix = LedgerInstruction::AuthorizeExecutor {
                executor,
                authorize: true,
            }
            .into_instruction(program_id, address, owner);
            let sig = self.timed(self.ledger.submit(ix)).await?;
            info!(owner = %owner.short(), executor = %executor.short(), "Executor authorized");
            receipt.authorize_signature = Some(sig);
        }

        if !delegated {
            let ix = LedgerInstruction::DelegateExecutor.into_instruction(program_id, address, owner);
            let sig = self.timed(self.ledger.submit(ix)).await?;
            info!(owner = %owner.short(), "Executor delegated");
            receipt.delegate_signature = Some(sig);
        }

        receipt.delegated = true;
        Ok(())
    }

    async fn timed<T>(&self, fut: impl Future<Output = LedgerResult<T>>) -> MonitorResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout {
                operation: "intake",
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}
