//! Order payload and its enums.
//!
//! An `Order` is created client-side and only ever travels sealed. The
//! executor sees the plaintext after decrypting it; the ledger only sees its
//! commitment hash until execution reveals the fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{CommitmentHash, FeedId, Pubkey, Salt};

/// Exclusive upper bound on perp market indices accepted by the executing program.
pub const MARKET_INDEX_LIMIT: u16 = 128;

/// Price comparison that arms an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerCondition {
    /// Fire when price >= trigger price.
    Above,
    /// Fire when price <= trigger price.
    Below,
}

impl TriggerCondition {
    /// Byte used in the commitment preimage and the on-ledger struct.
    #[must_use]
    pub fn commitment_code(self) -> u8 {
        match self {
            Self::Above => 0,
            Self::Below => 1,
        }
    }

    pub fn from_commitment_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Above),
            1 => Ok(Self::Below),
            other => Err(CoreError::Encoding(format!(
                "trigger condition code {other} out of range"
            ))),
        }
    }
}

impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
        }
    }
}

/// Position direction of the order to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Long,
    Short,
}

impl OrderSide {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Long => 0,
            Self::Short => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Long),
            1 => Ok(Self::Short),
            other => Err(CoreError::Encoding(format!("side code {other} out of range"))),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// The confidential conditional order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub owner: Pubkey,
    pub order_id: u64,
    pub market_index: u16,
    /// Trigger threshold in the feed's smallest price unit.
    pub trigger_price: u64,
    pub trigger_condition: TriggerCondition,
    pub side: OrderSide,
    pub base_asset_amount: u64,
    pub reduce_only: bool,
    /// Unix seconds; 0 means the order never expires.
    #[serde(default)]
    pub expiry: i64,
    pub feed_id: FeedId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Salt>,
}

impl Order {
    /// Check every field fits the width and range the executing program accepts.
    pub fn validate(&self) -> Result<()> {
        if self.market_index >= MARKET_INDEX_LIMIT {
            return Err(CoreError::Encoding(format!(
                "market index {} must be below {MARKET_INDEX_LIMIT}",
                self.market_index
            )));
        }
        if self.expiry < 0 {
            return Err(CoreError::Encoding(format!(
                "expiry {} must be non-negative",
                self.expiry
            )));
        }
        Ok(())
    }

    /// Commitment hash of this order (salt excluded).
    pub fn commitment(&self) -> Result<CommitmentHash> {
        crate::commitment::hash_order(self)
    }

    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        crate::trigger::is_expired(self.expiry, now)
    }
}
