//! Execution monitor for ghost orders.
//!
//! Tracks committed orders, decrypts them inside the executor, polls prices
//! and submits `ConsumeAndExecute` when a trigger fires.
//!
//! # Key Components
//!
//! - [`Monitor`]: start/stop lifecycle, order tracking, tick pipeline
//! - [`OrderIntake`]: seal + store + register for new orders
//! - [`EventBus`]: broadcast of [`MonitorEvent`]s to stream consumers
//! - [`PriceSource`]: feed id to price seam (static table or Hermes HTTP)
//! - [`RetryPolicy`]: exponential backoff for failed submissions
//!
//! # Per-order pipeline (in `Monitor::tick`)
//!
//! 1. Not decrypted -> fetch envelope, open, verify commitment
//! 2. Fetch price
//! 3. Expired -> drop, emit `order-expired`
//! 4. Wait -> stay active
//! 5. Fire -> re-read account, submit, emit `order-triggered`
//!
//! Failures never leave the loop; they become `order-error` events.

pub mod config;
pub mod error;
pub mod event;
pub mod intake;
pub mod monitor;
pub mod price;
pub mod retry;
pub mod tracked;

pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use event::{EventBus, MonitorEvent};
pub use intake::{IntakeReceipt, OrderIntake};
pub use monitor::{Monitor, MonitorStatus, TickReport};
pub use price::{
    DynPriceSource, HermesPriceSource, PriceConfig, PriceMode, PriceSource, StaticPriceSource,
};
pub use retry::RetryPolicy;
pub use tracked::{OrderRef, OrderStatus, OrderSummary};
