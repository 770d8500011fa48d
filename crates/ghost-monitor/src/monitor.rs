//! Execution monitor (the crank).
//!
//! Owns the tracked orders and a background polling loop. For every due
//! order a tick runs:
//!
//! 1. fetch ciphertext and decrypt (once, then cached)
//! 2. fetch the current price for the order's feed
//! 3. evaluate the trigger
//! 4. on fire, re-read the nullifier account and submit `ConsumeAndExecute`
//!
//! Orders are processed concurrently within a tick, but submissions to the
//! same owner's account are serialized. Ticks never overlap, and `stop()`
//! only prevents the next tick from starting; an in-flight submission runs
//! to completion.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::join_all;
use ghost_core::{Order, Pubkey, TriggerDecision, TxSignature};
use ghost_envelope::{DynEnvelopeSource, ExecutorKeypair};
use ghost_ledger::{
    derive_account_address, fetch_nullifier_account, ConsumeArgs, DynLedgerClient, LedgerError,
    LedgerInstruction,
};
use ghost_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::event::{now_ms, EventBus, MonitorEvent};
use crate::price::DynPriceSource;
use crate::retry::RetryPolicy;
use crate::tracked::{MonitoredOrder, OrderRef, OrderStatus, OrderSummary};

/// Snapshot returned by [`Monitor::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    pub orders: Vec<OrderSummary>,
}

/// Per-tick counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub processed: usize,
    pub waiting: usize,
    pub triggered: usize,
    pub expired: usize,
    pub failed: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Waiting,
    Triggered,
    Expired,
    Failed,
    Dropped,
    Skipped,
}

/// What a failure counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Price, ciphertext or account read.
    Fetch,
    /// Ledger submission.
    Submit,
}

impl TickReport {
    fn record(&mut self, outcome: Outcome) {
        if outcome == Outcome::Skipped {
            return;
        }
        self.processed += 1;
        match outcome {
            Outcome::Waiting => self.waiting += 1,
            Outcome::Triggered => self.triggered += 1,
            Outcome::Expired => self.expired += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Dropped => self.dropped += 1,
            Outcome::Skipped => {}
        }
    }
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    started: Instant,
    started_at_ms: i64,
}

struct Inner {
    config: MonitorConfig,
    retry: RetryPolicy,
    keypair: Option<Arc<ExecutorKeypair>>,
    /// Ledger identity that signs executions.
    executor: Pubkey,
    ledger: DynLedgerClient,
    prices: DynPriceSource,
    envelopes: DynEnvelopeSource,
    orders: DashMap<OrderRef, MonitoredOrder>,
    owner_locks: DashMap<Pubkey, Arc<AsyncMutex<()>>>,
    tick_lock: AsyncMutex<()>,
    run: Mutex<Option<RunHandle>>,
    events: EventBus,
}

/// Cloneable handle to the monitor.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Build a stopped monitor. Without a keypair the monitor can track
    /// orders and report status but refuses to start.
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        ledger: DynLedgerClient,
        prices: DynPriceSource,
        envelopes: DynEnvelopeSource,
        keypair: Option<Arc<ExecutorKeypair>>,
    ) -> Self {
        let executor = keypair
            .as_ref()
            .map(|k| Pubkey::new(*k.public_key().as_bytes()))
            .unwrap_or_default();
        let events = EventBus::new(config.event_capacity);

        Self {
            inner: Arc::new(Inner {
                retry: RetryPolicy::from_config(&config),
                config,
                keypair,
                executor,
                ledger,
                prices,
                envelopes,
                orders: DashMap::new(),
                owner_locks: DashMap::new(),
                tick_lock: AsyncMutex::new(()),
                run: Mutex::new(None),
                events,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Start the polling loop.
    ///
    /// # Errors
    /// `MissingCredential` without an executor key, `AlreadyRunning` if the
    /// loop is live.
    pub fn start(&self) -> MonitorResult<()> {
        if self.inner.keypair.is_none() {
            return Err(MonitorError::MissingCredential);
        }

        let mut run = self.inner.run.lock();
        if run.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(Arc::clone(&self.inner), cancel.clone()));
        *run = Some(RunHandle {
            cancel,
            task,
            started: Instant::now(),
            started_at_ms: now_ms(),
        });

        Metrics::monitor_running(true);
        info!(
            poll_interval_ms = self.inner.config.poll_interval_ms,
            tracked = self.inner.orders.len(),
            "Monitor started"
        );
        Ok(())
    }

    /// Stop polling. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let Some(handle) = self.inner.run.lock().take() else {
            return false;
        };
        handle.cancel.cancel();
        Metrics::monitor_running(false);
        info!("Monitor stop requested");
        true
    }

    /// Stop and wait for the in-flight tick to finish.
    pub async fn shutdown(&self) {
        let handle = self.inner.run.lock().take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            Metrics::monitor_running(false);
            if let Err(e) = handle.task.await {
                error!(error = %e, "Monitor loop task failed");
            }
            info!("Monitor shut down");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .run
            .lock()
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Begin tracking an order.
    ///
    /// Returns false if the owner has no nullifier account, the hash is not
    /// outstanding in it, or the ledger cannot be reached.
    pub async fn add_order(&self, order_ref: OrderRef) -> bool {
        if self.inner.orders.contains_key(&order_ref) {
            return true;
        }

        let fetched = self
            .inner
            .timed(
                "account_fetch",
                fetch_nullifier_account(self.inner.ledger.as_ref(), &order_ref.owner),
            )
            .await;

        let account = match fetched {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!(order_ref = %order_ref, "No nullifier account for owner");
                return false;
            }
            Err(e) => {
                warn!(order_ref = %order_ref, error = %e, "Failed to resolve order reference");
                return false;
            }
        };

        if !account.has_hash(&order_ref.commitment) {
            warn!(
                order_ref = %order_ref,
                outstanding = account.count(),
                "Commitment not outstanding in nullifier account"
            );
            return false;
        }

        self.inner
            .orders
            .entry(order_ref)
            .or_insert_with(|| MonitoredOrder::new(order_ref, now_ms()));
        info!(
            owner = %order_ref.owner.short(),
            commitment = %order_ref.commitment.short(),
            "Tracking order"
        );
        self.inner.publish_gauges();
        true
    }

    /// Stop tracking an order. Returns false if it was not tracked.
    pub fn remove_order(&self, order_ref: &OrderRef) -> bool {
        let removed = self.inner.orders.remove(order_ref).is_some();
        if removed {
            self.inner.prune_owner_lock(&order_ref.owner);
            info!(commitment = %order_ref.commitment.short(), "Order removed from monitor");
            self.inner.publish_gauges();
        }
        removed
    }

    #[must_use]
    pub fn order_status(&self, order_ref: &OrderRef) -> Option<OrderSummary> {
        self.inner.orders.get(order_ref).map(|e| e.summary())
    }

    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        let (running, uptime_secs, started_at) = match self.inner.run.lock().as_ref() {
            Some(h) if !h.task.is_finished() => {
                (true, h.started.elapsed().as_secs(), Some(h.started_at_ms))
            }
            _ => (false, 0, None),
        };

        let mut orders: Vec<OrderSummary> =
            self.inner.orders.iter().map(|e| e.value().summary()).collect();
        orders.sort_by_key(|o| o.created_at);

        MonitorStatus {
            running,
            uptime_secs,
            started_at,
            orders,
        }
    }

    /// Run one tick now. The background loop calls the same path.
    pub async fn tick(&self) -> TickReport {
        self.inner.tick().await
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Not raced against cancellation: a started tick always completes
        inner.tick().await;
    }

    debug!("Monitor loop exited");
}

impl Inner {
    /// Bound a network call by `request_timeout`.
    async fn timed<T, E>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> MonitorResult<T>
    where
        MonitorError: From<E>,
    {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result.map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout {
                operation,
                timeout_ms: self.config.request_timeout_ms,
            }),
        }
    }

    async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let started = Instant::now();
        let now = now_ms();

        let due: Vec<OrderRef> = self
            .orders
            .iter()
            .filter(|e| e.value().is_due(now))
            .map(|e| *e.key())
            .collect();

        let outcomes = join_all(due.into_iter().map(|r| self.process(r))).await;

        let mut report = TickReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }

        self.publish_gauges();
        Metrics::tick_duration(started.elapsed().as_secs_f64() * 1000.0);
        if report.processed > 0 {
            debug!(
                processed = report.processed,
                triggered = report.triggered,
                expired = report.expired,
                failed = report.failed,
                "Tick complete"
            );
        }
        report
    }

    async fn process(&self, order_ref: OrderRef) -> Outcome {
        let Some(keypair) = self.keypair.as_deref() else {
            return Outcome::Skipped;
        };
        let cached = match self.orders.get(&order_ref) {
            Some(entry) => entry.decrypted.clone(),
            None => return Outcome::Skipped,
        };

        let order = match cached {
            Some(order) => order,
            None => match self.decrypt(order_ref, keypair).await {
                Ok(order) => {
                    self.update(&order_ref, |e| {
                        e.feed_id = Some(order.feed_id);
                        e.decrypted = Some(order.clone());
                        e.status = OrderStatus::Active;
                        e.last_error = None;
                    });
                    debug!(commitment = %order_ref.commitment.short(), "Order decrypted");
                    order
                }
                Err(e) => return self.fail(order_ref, e, Attempt::Fetch),
            },
        };

        let price = match self
            .timed("price_fetch", self.prices.get_price(order.feed_id))
            .await
        {
            Ok(price) => price,
            Err(e) => return self.fail(order_ref, e, Attempt::Fetch),
        };
        self.update(&order_ref, |e| e.fetch_failures = 0);

        match order.evaluate(price, ghost_core::unix_now()) {
            TriggerDecision::Expired => self.expire(order_ref),
            TriggerDecision::Wait => {
                self.update(&order_ref, |e| {
                    e.status = OrderStatus::Active;
                    e.next_attempt_at_ms = None;
                });
                Outcome::Waiting
            }
            TriggerDecision::Fire => self.execute(order_ref, &order, price).await,
        }
    }

    async fn decrypt(&self, order_ref: OrderRef, keypair: &ExecutorKeypair) -> MonitorResult<Order> {
        let envelope = self
            .timed("envelope_fetch", self.envelopes.fetch(order_ref.commitment))
            .await?
            .ok_or(MonitorError::EnvelopeUnavailable(order_ref.commitment))?;

        let order = ghost_envelope::open(&envelope, keypair)
            .map_err(|e| MonitorError::Decryption(e.to_string()))?;

        let actual = order
            .commitment()
            .map_err(|e| MonitorError::Decryption(e.to_string()))?;
        if actual != order_ref.commitment || order.owner != order_ref.owner {
            return Err(MonitorError::Decryption(format!(
                "plaintext hashes to {}, tracked {}",
                actual.short(),
                order_ref.commitment.short()
            )));
        }
        Ok(order)
    }

    async fn execute(&self, order_ref: OrderRef, order: &Order, price: u64) -> Outcome {
        let lock = self
            .owner_locks
            .entry(order_ref.owner)
            .or_default()
            .clone();
        let outcome = {
            let _serial = lock.lock().await;
            self.submit_execution(order_ref, order, price).await
        };
        drop(lock);
        self.prune_owner_lock(&order_ref.owner);
        outcome
    }

    /// Drop the owner's submission lock once none of its orders are tracked
    /// and no task holds it.
    fn prune_owner_lock(&self, owner: &Pubkey) {
        if self.orders.iter().any(|e| e.key().owner == *owner) {
            return;
        }
        self.owner_locks
            .remove_if(owner, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Runs under the owner's lock.
    async fn submit_execution(&self, order_ref: OrderRef, order: &Order, price: u64) -> Outcome {
        // Confirm the hash is still outstanding before (re)submitting
        let account = match self
            .timed(
                "account_fetch",
                fetch_nullifier_account(self.ledger.as_ref(), &order_ref.owner),
            )
            .await
        {
            Ok(account) => account,
            Err(e) => return self.fail(order_ref, e, Attempt::Fetch),
        };
        if !account.is_some_and(|a| a.has_hash(&order_ref.commitment)) {
            return self.drop_consumed(order_ref);
        }

        let program_id = self.ledger.program_id();
        let (address, _) = derive_account_address(&program_id, &order_ref.owner);
        let ix = LedgerInstruction::ConsumeAndExecute(ConsumeArgs::from_order(
            order,
            price,
            self.config.keep_delegated,
        ))
        .into_instruction(program_id, address, self.executor);

        info!(
            commitment = %order_ref.commitment.short(),
            market = order.market_index,
            price,
            trigger = order.trigger_price,
            condition = %order.trigger_condition,
            "Trigger fired, submitting execution"
        );

        let started = Instant::now();
        let result = self.timed("submit", self.ledger.submit(ix)).await;
        Metrics::submission(
            "consume_and_execute",
            result.is_ok(),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        match result {
            Ok(signature) => self.confirm(order_ref, signature),
            Err(MonitorError::Ledger(LedgerError::Submission(msg))) => {
                self.fail(order_ref, MonitorError::Submission(msg), Attempt::Submit)
            }
            Err(e) => self.fail(order_ref, e, Attempt::Submit),
        }
    }

    fn confirm(&self, order_ref: OrderRef, signature: TxSignature) -> Outcome {
        self.orders.remove(&order_ref);
        Metrics::order_triggered();
        info!(
            commitment = %order_ref.commitment.short(),
            signature = %signature,
            "Order executed"
        );
        self.events.publish(MonitorEvent::OrderTriggered {
            order_ref,
            owner: order_ref.owner,
            signature,
            timestamp: now_ms(),
        });
        Outcome::Triggered
    }

    /// The hash left the account without this monitor confirming it.
    fn drop_consumed(&self, order_ref: OrderRef) -> Outcome {
        let attempts = self
            .orders
            .remove(&order_ref)
            .map_or(0, |(_, e)| e.attempts);

        if attempts > 0 {
            info!(
                commitment = %order_ref.commitment.short(),
                attempts,
                "Commitment already consumed, earlier submission landed"
            );
        } else {
            warn!(
                commitment = %order_ref.commitment.short(),
                "Commitment no longer outstanding, dropping"
            );
            self.events.publish(MonitorEvent::OrderError {
                order_ref,
                owner: order_ref.owner,
                error: "commitment no longer outstanding on ledger".to_string(),
                timestamp: now_ms(),
            });
        }
        Outcome::Dropped
    }

    fn expire(&self, order_ref: OrderRef) -> Outcome {
        self.orders.remove(&order_ref);
        Metrics::order_expired();
        info!(commitment = %order_ref.commitment.short(), "Order expired");
        self.events.publish(MonitorEvent::OrderExpired {
            order_ref,
            owner: order_ref.owner,
            timestamp: now_ms(),
        });
        Outcome::Expired
    }

    /// Record a per-order failure and publish it. Never propagates.
    ///
    /// Retryable failures back off exponentially and go terminal once the
    /// budget for their `attempt` kind is spent; the rest are terminal at once.
    fn fail(&self, order_ref: OrderRef, err: MonitorError, attempt: Attempt) -> Outcome {
        let retryable = err.is_retryable();
        let message = err.to_string();
        Metrics::order_error(err.kind());

        let now = now_ms();
        let policy = self.retry;
        let mut terminal = !retryable;
        let mut attempts = 0;

        self.update(&order_ref, |e| {
            e.status = OrderStatus::Error;
            e.last_error = Some(message.clone());
            if retryable {
                let (failures, exhausted) = match attempt {
                    Attempt::Submit => {
                        e.attempts += 1;
                        (e.attempts, policy.exhausted(e.attempts))
                    }
                    Attempt::Fetch => {
                        e.fetch_failures += 1;
                        (e.fetch_failures, policy.fetch_exhausted(e.fetch_failures))
                    }
                };
                if exhausted {
                    e.terminal = true;
                } else {
                    let delay =
                        i64::try_from(policy.delay(failures).as_millis()).unwrap_or(i64::MAX);
                    e.next_attempt_at_ms = Some(now.saturating_add(delay));
                }
            } else {
                e.terminal = true;
            }
            if e.terminal {
                e.next_attempt_at_ms = None;
            }
            terminal = e.terminal;
            attempts = e.attempts;
        });

        if terminal {
            error!(
                commitment = %order_ref.commitment.short(),
                attempts,
                error = %message,
                "Order failed permanently"
            );
        } else {
            warn!(
                commitment = %order_ref.commitment.short(),
                attempts,
                error = %message,
                "Order failed, will retry"
            );
        }

        self.events.publish(MonitorEvent::OrderError {
            order_ref,
            owner: order_ref.owner,
            error: message,
            timestamp: now,
        });
        Outcome::Failed
    }

    fn update(&self, order_ref: &OrderRef, f: impl FnOnce(&mut MonitoredOrder)) {
        if let Some(mut entry) = self.orders.get_mut(order_ref) {
            f(entry.value_mut());
        }
    }

    fn publish_gauges(&self) {
        let mut counts = [0usize; OrderStatus::ALL.len()];
        for entry in &self.orders {
            let idx = OrderStatus::ALL
                .iter()
                .position(|s| *s == entry.value().status)
                .unwrap_or(0);
            counts[idx] += 1;
        }
        let labelled: Vec<(&str, usize)> = OrderStatus::ALL
            .iter()
            .zip(counts)
            .map(|(s, n)| (s.as_str(), n))
            .collect();

        Metrics::tracked_orders(self.orders.len());
        Metrics::status_counts(&labelled);
    }
}
