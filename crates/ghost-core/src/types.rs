//! Fixed-width identifiers.
//!
//! All identifiers are raw byte arrays on the wire and lowercase hex in
//! JSON, logs and URLs. Parsing is strict: the hex string must have exactly
//! twice the byte width.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a hex string of exactly `2 * LEN` characters.
            pub fn from_hex(s: &str) -> Result<Self> {
                if s.len() != $len * 2 {
                    return Err(CoreError::InvalidHex {
                        kind: $kind,
                        reason: format!("expected {} hex chars, got {}", $len * 2, s.len()),
                    });
                }
                let mut out = [0u8; $len];
                hex::decode_to_slice(s, &mut out).map_err(|e| CoreError::InvalidHex {
                    kind: $kind,
                    reason: e.to_string(),
                })?;
                Ok(Self(out))
            }

            /// Leading 8 hex chars, enough to correlate log lines.
            #[must_use]
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), self.short())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// Ledger identity of an order owner or an account address.
    Pubkey,
    32,
    "pubkey"
);

fixed_bytes!(
    /// 32-byte price feed identifier.
    FeedId,
    32,
    "feed id"
);

fixed_bytes!(
    /// 32-byte commitment digest of an order's hashed fields.
    ///
    /// Also serves as the nullifier: it is consumed exactly once at execution.
    CommitmentHash,
    32,
    "commitment hash"
);

fixed_bytes!(
    /// Random bytes that diversify an order's ciphertext. Never hashed.
    Salt,
    16,
    "salt"
);

fixed_bytes!(
    /// Confirmation signature returned by the ledger for an applied instruction.
    TxSignature,
    32,
    "signature"
);
