//! The monitor's view of a tracked order.

use std::fmt;
use std::str::FromStr;

use ghost_core::{CommitmentHash, FeedId, Order, Pubkey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MonitorError;

/// Identifies a tracked order: the owner's nullifier account plus the hash in it.
///
/// Text form is `<owner hex>:<commitment hex>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderRef {
    pub owner: Pubkey,
    pub commitment: CommitmentHash,
}

impl OrderRef {
    #[must_use]
    pub fn new(owner: Pubkey, commitment: CommitmentHash) -> Self {
        Self { owner, commitment }
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.commitment)
    }
}

impl FromStr for OrderRef {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, commitment) = s
            .split_once(':')
            .ok_or_else(|| MonitorError::Config(format!("order ref '{s}' missing ':'")))?;
        Ok(Self {
            owner: owner.parse()?,
            commitment: commitment.parse()?,
        })
    }
}

impl Serialize for OrderRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OrderRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Active,
    Triggered,
    Error,
    Expired,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Active,
        Self::Triggered,
        Self::Error,
        Self::Expired,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Triggered => "triggered",
            Self::Error => "error",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory tracking entry.
///
/// The decrypted order never leaves this struct; status queries go through
/// [`OrderSummary`].
#[derive(Debug, Clone)]
pub(crate) struct MonitoredOrder {
    pub order_ref: OrderRef,
    pub status: OrderStatus,
    pub feed_id: Option<FeedId>,
    pub decrypted: Option<Order>,
    pub created_at_ms: i64,
    pub attempts: u32,
    /// Consecutive transient fetch failures; reset on a good price read.
    pub fetch_failures: u32,
    pub next_attempt_at_ms: Option<i64>,
    pub last_error: Option<String>,
    /// No further processing; kept for visibility until removed.
    pub terminal: bool,
}

impl MonitoredOrder {
    pub fn new(order_ref: OrderRef, now_ms: i64) -> Self {
        Self {
            order_ref,
            status: OrderStatus::Pending,
            feed_id: None,
            decrypted: None,
            created_at_ms: now_ms,
            attempts: 0,
            fetch_failures: 0,
            next_attempt_at_ms: None,
            last_error: None,
            terminal: false,
        }
    }

    /// Eligible for processing on a tick at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        !self.terminal && self.next_attempt_at_ms.map_or(true, |at| now_ms >= at)
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_ref: self.order_ref,
            owner: self.order_ref.owner,
            commitment: self.order_ref.commitment,
            status: self.status,
            feed_id: self.feed_id,
            has_decrypted_data: self.decrypted.is_some(),
            created_at: self.created_at_ms,
            attempts: self.attempts,
            fetch_failures: self.fetch_failures,
            next_attempt_at: self.next_attempt_at_ms,
            last_error: self.last_error.clone(),
        }
    }
}

/// Status view of a tracked order. Carries no plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_ref: OrderRef,
    pub owner: Pubkey,
    pub commitment: CommitmentHash,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<FeedId>,
    pub has_decrypted_data: bool,
    pub created_at: i64,
    pub attempts: u32,
    pub fetch_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_ref_text_form() {
        let r = OrderRef::new(Pubkey::new([1; 32]), CommitmentHash::new([2; 32]));
        let text = r.to_string();
        assert_eq!(text, format!("{}:{}", "01".repeat(32), "02".repeat(32)));
        assert_eq!(text.parse::<OrderRef>().unwrap(), r);
    }

    #[test]
    fn test_order_ref_rejects_malformed() {
        assert!("nocolon".parse::<OrderRef>().is_err());
        assert!(format!("{}:abcd", "01".repeat(32)).parse::<OrderRef>().is_err());
    }

    #[test]
    fn test_due_respects_backoff_and_terminal() {
        let mut order = MonitoredOrder::new(
            OrderRef::new(Pubkey::new([1; 32]), CommitmentHash::new([2; 32])),
            1_000,
        );
        assert!(order.is_due(1_000));

        order.next_attempt_at_ms = Some(5_000);
        assert!(!order.is_due(4_999));
        assert!(order.is_due(5_000));

        order.terminal = true;
        assert!(!order.is_due(10_000));
    }

    #[test]
    fn test_summary_hides_plaintext() {
        let order = MonitoredOrder::new(
            OrderRef::new(Pubkey::new([1; 32]), CommitmentHash::new([2; 32])),
            1_000,
        );
        let json = serde_json::to_value(order.summary()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["hasDecryptedData"], false);
        assert!(json.get("decrypted").is_none());
    }
}
