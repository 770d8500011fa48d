//! Main application wiring.
//!
//! Builds the ledger client, price source, envelope store, intake and
//! monitor from config, then runs the monitor loop and the API server until
//! shutdown.

use std::future::Future;
use std::sync::Arc;

use ghost_api::{run_server, ApiState};
use ghost_envelope::{EnvelopeStore, ExecutorKeypair};
use ghost_ledger::MemoryLedger;
use ghost_monitor::{Monitor, MonitorError, OrderIntake, StaticPriceSource};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

pub struct Application {
    config: AppConfig,
    ledger: Arc<MemoryLedger>,
    static_prices: Option<Arc<StaticPriceSource>>,
    monitor: Monitor,
    intake: Arc<OrderIntake>,
}

impl Application {
    /// Create the application, loading the executor key if one is configured.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let keypair = match &config.executor.key {
            Some(source) => {
                let keypair = ExecutorKeypair::load(source, config.executor.public_key)?;
                info!(public_key = %keypair.public_key(), "Executor key loaded");
                Some(Arc::new(keypair))
            }
            None => {
                warn!("No executor key configured, monitor will not start");
                None
            }
        };
        Self::with_keypair(config, keypair)
    }

    /// Create the application with an already loaded key.
    pub fn with_keypair(
        config: AppConfig,
        keypair: Option<Arc<ExecutorKeypair>>,
    ) -> AppResult<Self> {
        let executor_key = keypair
            .as_ref()
            .map(|k| k.public_key())
            .or(config.executor.public_key)
            .ok_or_else(|| AppError::Config("No executor public key available".to_string()))?;

        let ledger = Arc::new(
            MemoryLedger::new(config.ledger.program_id)
                .with_perp_program(config.ledger.perp_program_id),
        );
        let (prices, static_prices) = config.price.build(config.monitor.request_timeout())?;
        let store = Arc::new(EnvelopeStore::new());

        let monitor = Monitor::new(
            config.monitor.clone(),
            ledger.clone(),
            prices,
            store.clone(),
            keypair,
        );
        let intake = Arc::new(OrderIntake::new(
            executor_key,
            store,
            ledger.clone(),
            config.monitor.request_timeout(),
        ));

        info!(
            program_id = %config.ledger.program_id.short(),
            price_mode = ?config.price.mode,
            executor = %executor_key,
            "Application initialized"
        );

        Ok(Self {
            config,
            ledger,
            static_prices,
            monitor,
            intake,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn intake(&self) -> &Arc<OrderIntake> {
        &self.intake
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    /// Handle for moving prices when running in static mode.
    pub fn static_prices(&self) -> Option<&Arc<StaticPriceSource>> {
        self.static_prices.as_ref()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` resolves or the API server fails.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        if self.config.auto_start {
            match self.monitor.start() {
                Ok(()) => {}
                Err(MonitorError::MissingCredential) => {
                    warn!("Monitor not started: no executor key");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (api_shutdown_tx, api_shutdown_rx) = oneshot::channel::<()>();
        let mut api_handle = if self.config.api.enabled {
            let state = ApiState::new(
                self.monitor.clone(),
                self.intake.clone(),
                self.config.api.clone(),
            );
            Some(tokio::spawn(run_server(state, async move {
                let _ = api_shutdown_rx.await;
            })))
        } else {
            None
        };

        tokio::pin!(shutdown);
        let api_exit = match api_handle.as_mut() {
            Some(handle) => tokio::select! {
                () = &mut shutdown => None,
                joined = handle => Some(joined),
            },
            None => {
                shutdown.await;
                None
            }
        };

        let _ = api_shutdown_tx.send(());
        self.monitor.shutdown().await;

        let joined = match api_exit {
            Some(joined) => Some(joined),
            None => match api_handle {
                Some(handle) => Some(handle.await),
                None => None,
            },
        };
        let result = match joined {
            Some(Ok(Ok(()))) | None => Ok(()),
            Some(Ok(Err(e))) => {
                error!(error = %e, "API server failed");
                Err(e.into())
            }
            Some(Err(e)) => {
                error!(error = %e, "API server task panicked");
                Err(AppError::Task(e.to_string()))
            }
        };

        info!(
            tracked = self.monitor.status().orders.len(),
            "Shutdown complete"
        );
        result
    }
}
