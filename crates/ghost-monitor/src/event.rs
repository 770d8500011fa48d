//! Monitor events and the bus they are published on.
//!
//! Consumers subscribe instead of registering callbacks. A consumer that
//! disconnects simply drops its receiver; publishing never blocks and never
//! fails because nobody is listening.

use ghost_core::{Pubkey, TxSignature};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::tracked::OrderRef;

/// Event pushed to stream consumers. Timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MonitorEvent {
    #[serde(rename_all = "camelCase")]
    OrderTriggered {
        order_ref: OrderRef,
        owner: Pubkey,
        signature: TxSignature,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    OrderError {
        order_ref: OrderRef,
        owner: Pubkey,
        error: String,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    OrderExpired {
        order_ref: OrderRef,
        owner: Pubkey,
        timestamp: i64,
    },
    Ping {
        timestamp: i64,
    },
}

impl MonitorEvent {
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: now_ms(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderTriggered { .. } => "order-triggered",
            Self::OrderError { .. } => "order-error",
            Self::OrderExpired { .. } => "order-expired",
            Self::Ping { .. } => "ping",
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Broadcast fan-out for monitor events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers. Returns how many received it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!(kind, "No subscribers for event");
                0
            }
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_core::CommitmentHash;

    fn order_ref() -> OrderRef {
        OrderRef::new(Pubkey::new([1; 32]), CommitmentHash::new([2; 32]))
    }

    #[test]
    fn test_triggered_wire_shape() {
        let event = MonitorEvent::OrderTriggered {
            order_ref: order_ref(),
            owner: Pubkey::new([1; 32]),
            signature: TxSignature::new([3; 32]),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order-triggered");
        assert_eq!(json["orderRef"], order_ref().to_string());
        assert_eq!(json["signature"], "03".repeat(32));
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_error_and_ping_shape() {
        let event = MonitorEvent::OrderError {
            order_ref: order_ref(),
            owner: Pubkey::new([1; 32]),
            error: "Decryption failed".into(),
            timestamp: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order-error");
        assert_eq!(json["error"], "Decryption failed");

        let ping = serde_json::to_value(MonitorEvent::ping()).unwrap();
        assert_eq!(ping["type"], "ping");
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(MonitorEvent::ping()), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_break_publish() {
        let bus = EventBus::new(4);
        let mut alive = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);

        assert_eq!(bus.publish(MonitorEvent::ping()), 1);
        assert_eq!(alive.recv().await.unwrap().kind(), "ping");
    }
}
