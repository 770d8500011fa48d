//! ghost-crank - confidential trigger-order crank.
//!
//! Wires the pieces together:
//! - Order intake (seal, store, register commitment)
//! - Execution monitor (decrypt, evaluate, consume-and-execute)
//! - HTTP control surface and event stream

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
