//! Off-ledger envelope storage keyed by commitment hash.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ghost_core::{BoxFuture, CommitmentHash, Pubkey};
use tracing::{debug, info};

use crate::envelope::EncryptedEnvelope;
use crate::error::{EnvelopeError, EnvelopeResult};

/// Ciphertexts larger than this are refused at intake.
pub const MAX_CIPHERTEXT_LEN: usize = 2048;

/// Where the monitor fetches ciphertext from.
///
/// A network-backed implementation may be slow, so callers wrap `fetch` in
/// their own timeout.
pub trait EnvelopeSource: Send + Sync {
    fn fetch(
        &self,
        commitment: CommitmentHash,
    ) -> BoxFuture<'_, EnvelopeResult<Option<EncryptedEnvelope>>>;
}

pub type DynEnvelopeSource = Arc<dyn EnvelopeSource>;

/// In-process envelope store.
///
/// Reads are public (the ciphertext is useless without the executor key);
/// deletion is restricted to the order owner.
#[derive(Debug, Default)]
pub struct EnvelopeStore {
    envelopes: DashMap<CommitmentHash, EncryptedEnvelope>,
}

impl EnvelopeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an envelope. A second envelope for the same commitment is refused.
    pub fn insert(&self, envelope: EncryptedEnvelope) -> EnvelopeResult<()> {
        if envelope.ciphertext.len() > MAX_CIPHERTEXT_LEN {
            return Err(EnvelopeError::TooLarge {
                len: envelope.ciphertext.len(),
                max: MAX_CIPHERTEXT_LEN,
            });
        }

        match self.envelopes.entry(envelope.commitment) {
            Entry::Occupied(_) => Err(EnvelopeError::DuplicateHash(envelope.commitment)),
            Entry::Vacant(slot) => {
                info!(
                    commitment = %envelope.commitment.short(),
                    owner = %envelope.owner.short(),
                    "Envelope stored"
                );
                slot.insert(envelope);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, commitment: &CommitmentHash) -> Option<EncryptedEnvelope> {
        self.envelopes.get(commitment).map(|e| e.value().clone())
    }

    /// Remove an envelope on behalf of `requester`.
    pub fn delete(
        &self,
        commitment: &CommitmentHash,
        requester: &Pubkey,
    ) -> EnvelopeResult<EncryptedEnvelope> {
        match self.envelopes.entry(*commitment) {
            Entry::Vacant(_) => Err(EnvelopeError::NotFound(*commitment)),
            Entry::Occupied(slot) => {
                if slot.get().owner != *requester {
                    return Err(EnvelopeError::Unauthorized);
                }
                debug!(commitment = %commitment.short(), "Envelope deleted");
                Ok(slot.remove())
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

impl EnvelopeSource for EnvelopeStore {
    fn fetch(
        &self,
        commitment: CommitmentHash,
    ) -> BoxFuture<'_, EnvelopeResult<Option<EncryptedEnvelope>>> {
        Box::pin(async move { Ok(self.get(&commitment)) })
    }
}
