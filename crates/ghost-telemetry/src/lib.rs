//! Prometheus metrics and structured logging for the ghost-order crank.
//!
//! - Structured logging via `tracing` (JSON in production, pretty otherwise)
//! - Prometheus metrics for tracked orders, triggers, errors and latency

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
