//! Executor key management.
//!
//! The executor holds one X25519 secret. Clients only ever see the public
//! half, which they seal orders against.

use std::fmt;
use std::path::PathBuf;

use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Where the executor secret is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

/// X25519 public key orders are sealed against.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutorPublicKey([u8; 32]);

impl ExecutorPublicKey {
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> EnvelopeResult<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.trim().trim_start_matches("0x"), &mut out)
            .map_err(|e| EnvelopeError::Key(format!("invalid public key hex: {e}")))?;
        Ok(Self(out))
    }

    pub(crate) fn to_box_key(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Display for ExecutorPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ExecutorPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutorPublicKey({})", self.to_hex())
    }
}

impl Serialize for ExecutorPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ExecutorPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Executor decryption keypair.
///
/// Security notes:
/// - The secret zeroizes on drop.
/// - Keys are loaded once at startup; no runtime rotation.
/// - `Debug` prints only the public half.
pub struct ExecutorKeypair {
    secret: SecretKey,
    public: ExecutorPublicKey,
}

impl ExecutorKeypair {
    /// Fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate(&mut OsRng))
    }

    #[must_use]
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(SecretKey::from(bytes))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = ExecutorPublicKey::new(*secret.public_key().as_bytes());
        Self { secret, public }
    }

    /// Load the secret from `source`, optionally verifying the derived public key.
    ///
    /// # Errors
    /// Returns `EnvelopeError::Key` if the variable is missing, the hex is
    /// malformed, the secret is not 32 bytes, or the public key differs
    /// from `expected`. File read failures surface as `EnvelopeError::Io`.
    pub fn load(
        source: &KeySource,
        expected: Option<ExecutorPublicKey>,
    ) -> EnvelopeResult<Self> {
        fn parse_hex_key(hex_str: &str) -> EnvelopeResult<Zeroizing<[u8; 32]>> {
            let trimmed = hex_str.trim().trim_start_matches("0x");
            let mut out = Zeroizing::new([0u8; 32]);
            hex::decode_to_slice(trimmed, out.as_mut_slice())
                .map_err(|e| EnvelopeError::Key(format!("invalid secret key hex: {e}")))?;
            Ok(out)
        }

        let secret = match source {
            KeySource::EnvVar { var_name } => {
                let hex = Zeroizing::new(
                    std::env::var(var_name)
                        .map_err(|_| EnvelopeError::Key(format!("{var_name} not set")))?,
                );
                parse_hex_key(&hex)?
            }
            KeySource::File { path } => {
                let content = Zeroizing::new(std::fs::read_to_string(path)?);
                parse_hex_key(&content)?
            }
        };

        let keypair = Self::from_secret_bytes(*secret);

        if let Some(expected) = expected {
            if keypair.public != expected {
                return Err(EnvelopeError::Key(format!(
                    "public key mismatch: expected {expected}, derived {}",
                    keypair.public
                )));
            }
        }

        Ok(keypair)
    }

    #[must_use]
    pub fn public_key(&self) -> ExecutorPublicKey {
        self.public
    }

    pub(crate) fn unseal(&self, ciphertext: &[u8]) -> EnvelopeResult<Vec<u8>> {
        self.secret
            .unseal(ciphertext)
            .map_err(|_| EnvelopeError::Decryption("authentication failed".to_string()))
    }
}

impl fmt::Debug for ExecutorKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorKeypair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}
