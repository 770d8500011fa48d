//! ghost-api - HTTP control surface and event stream for the crank.
//!
//! - `POST /api/orders`: seal, store and register an order
//! - `GET|DELETE /api/envelopes/{hash}`: ciphertext lookup, owner-scoped delete
//! - `/api/monitor/*`: start, stop, status, track/untrack
//! - `GET /ws`: push stream of monitor events plus heartbeat pings
//! - `GET /metrics`: Prometheus text
//!
//! Mutating routes require `Authorization: Bearer <token>` when a token is
//! configured. Reads are open: ciphertext leaks nothing and status never
//! carries plaintext.
//!
//! # Usage
//!
//! ```ignore
//! let state = ApiState::new(monitor.clone(), intake, config.api.clone());
//! tokio::spawn(async move {
//!     if let Err(e) = run_server(state, shutdown_signal()).await {
//!         tracing::error!(error = %e, "API server failed");
//!     }
//! });
//! ```

mod broadcast;
mod config;
mod error;
mod server;
mod state;
mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server};
pub use state::{ApiState, ConnectionLimiter};
pub use types::{SubmitOrderRequest, SubmitOrderResponse};
