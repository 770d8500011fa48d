//! Sealed order envelopes for ghost orders.
//!
//! An order is sealed against the executor's X25519 public key with an
//! anonymous-sender sealed box (ephemeral key + XSalsa20-Poly1305). Only the
//! holder of the executor secret can open it; a wrong key fails
//! authentication instead of yielding garbage.
//!
//! # Key Components
//!
//! - [`seal`] / [`open`]: envelope creation and decryption
//! - [`ExecutorKeypair`]: executor secret, loaded from env or file
//! - [`EnvelopeStore`]: off-ledger lookup keyed by commitment hash

pub mod envelope;
pub mod error;
pub mod keys;
pub mod store;

pub use envelope::{open, random_salt, seal, EncryptedEnvelope, ENVELOPE_VERSION};
pub use error::{EnvelopeError, EnvelopeResult};
pub use keys::{ExecutorKeypair, ExecutorPublicKey, KeySource};
pub use store::{DynEnvelopeSource, EnvelopeSource, EnvelopeStore, MAX_CIPHERTEXT_LEN};
