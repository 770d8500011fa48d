//! Core domain types for ghost orders.
//!
//! This crate provides the pieces every other crate agrees on:
//! - `Order`: the confidential conditional order payload
//! - `CommitmentHash`: the BLAKE3 digest binding an order's economic fields
//! - `Pubkey`, `FeedId`, `Salt`, `TxSignature`: fixed-width identifiers
//! - `evaluate`: the pure trigger decision (fire / wait / expired)

pub mod commitment;
pub mod error;
pub mod order;
pub mod trigger;
pub mod types;

pub use commitment::{commitment_preimage, hash_order, COMMITMENT_PREIMAGE_LEN};
pub use error::{CoreError, Result};
pub use order::{Order, OrderSide, TriggerCondition, MARKET_INDEX_LIMIT};
pub use trigger::{evaluate, is_expired, TriggerDecision};
pub use types::{CommitmentHash, FeedId, Pubkey, Salt, TxSignature};

use std::future::Future;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
