//! Shared handler state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use ghost_monitor::{Monitor, OrderIntake};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Caps concurrent stream connections.
#[derive(Debug)]
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot. The guard owns the limiter so it can move into the
    /// upgraded connection task.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub(crate) monitor: Monitor,
    pub(crate) intake: Arc<OrderIntake>,
    pub(crate) limiter: Arc<ConnectionLimiter>,
    pub(crate) config: ApiConfig,
}

impl ApiState {
    pub fn new(monitor: Monitor, intake: Arc<OrderIntake>, config: ApiConfig) -> Self {
        Self {
            monitor,
            intake,
            limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }

    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Check the bearer token on a mutating request.
    pub(crate) fn authorize(&self, headers: &HeaderMap) -> ApiResult<()> {
        let Some(expected) = self.config.token.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if token == expected => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
