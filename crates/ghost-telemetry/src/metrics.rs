//! Prometheus metrics for the crank.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`: a failure means duplicate metric
//! names, which is a startup bug. It can only happen during static
//! initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec,
    register_int_gauge, register_int_gauge_vec, Counter, CounterVec, Encoder, Histogram,
    HistogramVec, IntGauge, IntGaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Orders currently tracked by the monitor.
pub static TRACKED_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ghost_tracked_orders", "Orders currently tracked by the monitor").unwrap()
});

/// Tracked orders by status.
/// Labels: status (pending/active/triggered/error/expired)
pub static ORDERS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "ghost_orders_by_status",
        "Tracked orders by status",
        &["status"]
    )
    .unwrap()
});

/// 1 while the polling loop runs.
pub static MONITOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ghost_monitor_running", "Monitor polling loop state (1=running)")
        .unwrap()
});

pub static TRIGGERS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("ghost_triggers_total", "Orders executed after trigger").unwrap()
});

pub static EXPIRATIONS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("ghost_expirations_total", "Orders dropped as expired").unwrap()
});

/// Labels: kind (decryption/price_fetch/submission/timeout/ledger/...)
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ghost_errors_total",
        "Per-order errors by kind",
        &["kind"]
    )
    .unwrap()
});

/// Labels: instruction
pub static SUBMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ghost_submissions_total",
        "Ledger submissions by outcome",
        &["instruction", "outcome"]
    )
    .unwrap()
});

pub static TICK_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ghost_tick_duration_ms",
        "Monitor tick duration in milliseconds",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Labels: instruction
pub static SUBMISSION_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ghost_submission_latency_ms",
        "Ledger submission latency in milliseconds",
        &["instruction"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Stream subscribers currently connected.
pub static STREAM_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ghost_stream_clients", "Connected event stream clients").unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn tracked_orders(count: usize) {
        TRACKED_ORDERS.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Replace the per-status breakdown.
    pub fn status_counts(counts: &[(&str, usize)]) {
        for (status, count) in counts {
            ORDERS_BY_STATUS
                .with_label_values(&[status])
                .set(i64::try_from(*count).unwrap_or(i64::MAX));
        }
    }

    pub fn monitor_running(running: bool) {
        MONITOR_RUNNING.set(i64::from(running));
    }

    pub fn order_triggered() {
        TRIGGERS_TOTAL.inc();
    }

    pub fn order_expired() {
        EXPIRATIONS_TOTAL.inc();
    }

    pub fn order_error(kind: &str) {
        ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn submission(instruction: &str, ok: bool, latency_ms: f64) {
        let outcome = if ok { "ok" } else { "failed" };
        SUBMISSIONS_TOTAL
            .with_label_values(&[instruction, outcome])
            .inc();
        SUBMISSION_LATENCY_MS
            .with_label_values(&[instruction])
            .observe(latency_ms);
    }

    pub fn tick_duration(duration_ms: f64) {
        TICK_DURATION_MS.observe(duration_ms);
    }

    pub fn stream_client_connected() {
        STREAM_CLIENTS.inc();
    }

    pub fn stream_client_disconnected() {
        STREAM_CLIENTS.dec();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
