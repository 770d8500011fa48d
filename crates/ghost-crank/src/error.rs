//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Executor key error: {0}")]
    Key(#[from] ghost_envelope::EnvelopeError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] ghost_monitor::MonitorError),

    #[error("API error: {0}")]
    Api(#[from] ghost_api::ApiError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] ghost_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
