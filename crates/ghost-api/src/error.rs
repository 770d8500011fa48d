//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ghost_core::CoreError;
use ghost_envelope::EnvelopeError;
use ghost_ledger::LedgerError;
use ghost_monitor::MonitorError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(e: EnvelopeError) -> Self {
        let msg = e.to_string();
        match e {
            EnvelopeError::DuplicateHash(_) => Self::Conflict(msg),
            EnvelopeError::NotFound(_) => Self::NotFound(msg),
            EnvelopeError::Unauthorized => Self::Forbidden(msg),
            EnvelopeError::Core(_) | EnvelopeError::TooLarge { .. } => Self::BadRequest(msg),
            _ => Self::Internal(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let msg = e.to_string();
        match e {
            LedgerError::DuplicateHash(_) | LedgerError::CapacityExceeded { .. } => {
                Self::Conflict(msg)
            }
            LedgerError::Unauthorized | LedgerError::ExecutorNotAuthorized(_) => {
                Self::Forbidden(msg)
            }
            LedgerError::HashNotFound(_) | LedgerError::AccountNotFound(_) => Self::NotFound(msg),
            LedgerError::Submission(_) => Self::Unavailable(msg),
            LedgerError::Core(_) => Self::BadRequest(msg),
            _ => Self::Conflict(msg),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        let msg = e.to_string();
        match e {
            MonitorError::Encoding(inner) => inner.into(),
            MonitorError::Envelope(inner) => inner.into(),
            MonitorError::Ledger(inner) => inner.into(),
            MonitorError::AlreadyRunning => Self::Conflict(msg),
            MonitorError::MissingCredential
            | MonitorError::Timeout { .. }
            | MonitorError::PriceFetch(_)
            | MonitorError::Submission(_) => Self::Unavailable(msg),
            MonitorError::Config(reason) => Self::BadRequest(reason),
            _ => Self::Internal(msg),
        }
    }
}
