//! Envelope sealing and opening.

use std::fmt;

use crypto_box::aead::rand_core::RngCore;
use crypto_box::aead::OsRng;
use ghost_core::{CommitmentHash, Order, Pubkey, Salt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::keys::{ExecutorKeypair, ExecutorPublicKey};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// A sealed order plus the public metadata needed to route it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub version: u8,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    pub commitment: CommitmentHash,
    pub owner: Pubkey,
    pub created_at: i64,
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("version", &self.version)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("commitment", &self.commitment)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Random salt for a new order.
#[must_use]
pub fn random_salt() -> Salt {
    let mut bytes = [0u8; Salt::LEN];
    OsRng.fill_bytes(&mut bytes);
    Salt::new(bytes)
}

/// Seal `order` against the executor's public key.
///
/// The commitment is computed from the plaintext before encryption. Two
/// seals of the same order produce different ciphertexts (fresh ephemeral
/// key each time) but the same commitment.
pub fn seal(order: &Order, executor: &ExecutorPublicKey) -> EnvelopeResult<EncryptedEnvelope> {
    let commitment = order.commitment()?;
    let plaintext = Zeroizing::new(
        serde_json::to_vec(order).map_err(|e| ghost_core::CoreError::Encoding(e.to_string()))?,
    );

    let ciphertext = executor
        .to_box_key()
        .seal(&mut OsRng, &plaintext)
        .map_err(|_| EnvelopeError::Encryption)?;

    debug!(
        commitment = %commitment.short(),
        ciphertext_len = ciphertext.len(),
        "Order sealed"
    );

    Ok(EncryptedEnvelope {
        version: ENVELOPE_VERSION,
        ciphertext,
        commitment,
        owner: order.owner,
        created_at: ghost_core::unix_now(),
    })
}

/// Open an envelope with the executor's keypair.
///
/// Fails with `Decryption` on a wrong key or tampered bytes, and with
/// `CommitmentMismatch` if the plaintext does not hash to the envelope's
/// commitment or belongs to a different owner.
pub fn open(envelope: &EncryptedEnvelope, keypair: &ExecutorKeypair) -> EnvelopeResult<Order> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(envelope.version));
    }

    let plaintext = Zeroizing::new(keypair.unseal(&envelope.ciphertext)?);
    let order: Order = serde_json::from_slice(&plaintext)
        .map_err(|e| EnvelopeError::Decryption(format!("malformed plaintext: {e}")))?;

    let actual = order.commitment()?;
    if actual != envelope.commitment || order.owner != envelope.owner {
        return Err(EnvelopeError::CommitmentMismatch {
            expected: envelope.commitment,
            actual,
        });
    }

    Ok(order)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
