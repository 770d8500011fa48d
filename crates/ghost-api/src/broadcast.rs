//! Stream heartbeat.
//!
//! Publishes a `ping` on the monitor's event bus at a fixed interval so
//! stream clients can detect a dead connection.

use std::time::Duration;

use ghost_monitor::{EventBus, MonitorEvent};
use tracing::trace;

pub async fn run_heartbeat(events: EventBus, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    // First tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let receivers = events.publish(MonitorEvent::ping());
        trace!(receivers, "Heartbeat sent");
    }
}
