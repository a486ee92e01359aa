// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public entry point: buffers submitted entries, sends flushed batches
//! through the caller's transport and retries failures with backoff.
//!
//! # Actor Pattern
//!
//! ```text
//!    ┌──────────────────┐
//!    │ CoordinatorHandle│ (Clone, many producers)
//!    └────────┬─────────┘
//!             │ Commands via channel
//!             v
//!    ┌──────────────────┐   save timer tick   ┌───────────┐
//!    │   Coordinator    │ <────────────────── │ LogBuffer │
//!    │    actor task    │ ──────────────────> │           │
//!    └──┬────────────▲──┘                     └───────────┘
//!       │ spawn send │ SendCompleted / RetryDue
//!       v            │
//!    ┌──────────────────┐
//!    │ Transport tasks, │ (hold weak senders only)
//!    │ retry timers     │
//!    └──────────────────┘
//! ```
//!
//! The buffer, the in-flight registry and every batch's retry counters are
//! owned by the actor task, so all their mutation is sequential no matter
//! how many runtime threads the transport and timers run on.
//!
//! # Shutdown
//!
//! The coordinator stops when [`CoordinatorHandle::shutdown`] is called,
//! when its cancellation token is cancelled, or when every handle has been
//! dropped. Retry timers are cancelled at that point. Transport tasks and
//! timers only hold weak senders, so anything completing later is a no-op.
//! Entries still buffered or awaiting a retry are dropped with a warning;
//! call [`CoordinatorHandle::flush`] first and wait for
//! [`DeliveryStats::in_flight`] to reach zero to drain.

use std::collections::BTreeMap;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::batch::{Batch, BatchId, BatchIdGenerator, BatchState, RetryDecision};
use crate::buffer::{Flush, LogBuffer};
use crate::config::BufferConfig;
use crate::error::{QueryError, SubmitError};
use crate::log_entry::{LogEntry, LogLevel};
use crate::registry::InFlightRegistry;
use crate::transport::{FailureHandler, SendOutcome, Transport};

#[derive(Debug)]
enum Command {
    Submit {
        entry: LogEntry,
        send_instantly: bool,
    },
    Flush(oneshot::Sender<Option<BatchId>>),
    Stats(oneshot::Sender<DeliveryStats>),
    SendCompleted {
        id: BatchId,
        outcome: SendOutcome,
    },
    RetryDue(BatchId),
    Shutdown,
}

/// Counters describing what a coordinator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Entries accepted through `submit`/`log`.
    pub submitted: u64,
    pub batches_created: u64,
    /// Transport invocations, first attempts and retries alike.
    pub send_attempts: u64,
    pub delivered: u64,
    pub retries_scheduled: u64,
    /// Batches handed to the failure handler.
    pub exhausted: u64,
    /// Batches awaiting a transport outcome or a retry timer.
    pub in_flight: usize,
    /// Entries waiting in the buffer.
    pub buffered: usize,
}

/// Cloneable handle for submitting entries to a running coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Submits `entry`. With `send_instantly` the entry skips the buffer and
    /// is sent on its own as a one-entry batch.
    ///
    /// Delivery failures are never reported here; they are retried and, if
    /// retries run out, passed to the failure handler.
    pub fn submit(&self, entry: LogEntry, send_instantly: bool) -> Result<(), SubmitError> {
        self.tx
            .send(Command::Submit {
                entry,
                send_instantly,
            })
            .map_err(|_| SubmitError::Closed)
    }

    /// Builds an entry from its parts and submits it.
    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        metadata: BTreeMap<String, Value>,
        tags: Option<Vec<String>>,
        send_instantly: bool,
    ) -> Result<(), SubmitError> {
        let entry = LogEntry::new(message)
            .with_level(level)
            .with_metadata_map(metadata)
            .with_tags(tags.unwrap_or_default());
        self.submit(entry, send_instantly)
    }

    /// Flushes the buffer now, ignoring `min_buffer_size`.
    ///
    /// Resolves once the batch has been handed to the transport, with its id,
    /// or with `None` when the buffer was empty.
    pub async fn flush(&self) -> Result<Option<BatchId>, QueryError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(response_tx))
            .map_err(|_| QueryError::Send("flush"))?;

        response_rx.await.map_err(|_| QueryError::Receive("flush"))
    }

    pub async fn stats(&self) -> Result<DeliveryStats, QueryError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(Command::Stats(response_tx))
            .map_err(|_| QueryError::Send("stats"))?;

        response_rx.await.map_err(|_| QueryError::Receive("stats"))
    }

    /// Stops the coordinator. Commands already queued are handled first.
    pub fn shutdown(&self) -> Result<(), SubmitError> {
        self.tx
            .send(Command::Shutdown)
            .map_err(|_| SubmitError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owns the buffer and the in-flight registry, and runs the delivery loop.
pub struct DeliveryCoordinator {
    config: BufferConfig,
    buffer: LogBuffer,
    registry: InFlightRegistry,
    ids: BatchIdGenerator,
    transport: Arc<dyn Transport>,
    failure_handler: Arc<dyn FailureHandler>,
    rx: mpsc::UnboundedReceiver<Command>,
    weak_tx: mpsc::WeakUnboundedSender<Command>,
    save_timer: Option<Interval>,
    cancel_token: CancellationToken,
    stats: DeliveryStats,
}

impl DeliveryCoordinator {
    /// Creates a coordinator and the handle used to feed it.
    ///
    /// The coordinator does nothing until [`run`](Self::run) is spawned.
    #[must_use]
    pub fn new(
        config: BufferConfig,
        transport: Arc<dyn Transport>,
        failure_handler: Arc<dyn FailureHandler>,
    ) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            buffer: LogBuffer::new(&config),
            config,
            registry: InFlightRegistry::new(),
            ids: BatchIdGenerator::default(),
            transport,
            failure_handler,
            weak_tx: tx.downgrade(),
            rx,
            save_timer: None,
            cancel_token: CancellationToken::new(),
            stats: DeliveryStats::default(),
        };

        (coordinator, CoordinatorHandle { tx })
    }

    /// Creates a coordinator and spawns it on the current runtime.
    pub fn spawn(
        config: BufferConfig,
        transport: Arc<dyn Transport>,
        failure_handler: Arc<dyn FailureHandler>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (coordinator, handle) = Self::new(config, transport, failure_handler);
        (handle, tokio::spawn(coordinator.run()))
    }

    /// Token that stops the coordinator when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Processes commands and timer ticks until shutdown.
    pub async fn run(mut self) {
        debug!(
            "COORDINATOR | Started (save_time={:?}, min={}, max={}, max_retries={})",
            self.config.save_time(),
            self.config.min_buffer_size(),
            self.config.max_buffer_size(),
            self.config.max_retries()
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("COORDINATOR | Cancellation requested");
                    break;
                }
                command = self.rx.recv() => match command {
                    Some(Command::Shutdown) => {
                        debug!("COORDINATOR | Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("COORDINATOR | All handles dropped");
                        break;
                    }
                },
                () = next_tick(&mut self.save_timer) => self.on_save_timer(),
            }
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit {
                entry,
                send_instantly,
            } => {
                self.stats.submitted += 1;
                if send_instantly {
                    let batch = Batch::new(self.ids.next_id(), vec![entry]);
                    self.stats.batches_created += 1;
                    self.dispatch(batch);
                } else if let Some(flush) = self.buffer.add_log(entry) {
                    self.on_buffer_flush(flush);
                }
                self.sync_save_timer();
            }
            Command::Flush(response_tx) => {
                let id = self.buffer.flush_now().map(|flush| self.on_buffer_flush(flush));
                self.sync_save_timer();
                if response_tx.send(id).is_err() {
                    error!("COORDINATOR | Failed to send flush response - receiver dropped");
                }
            }
            Command::Stats(response_tx) => {
                if response_tx.send(self.snapshot()).is_err() {
                    error!("COORDINATOR | Failed to send stats response - receiver dropped");
                }
            }
            Command::SendCompleted { id, outcome } => self.on_send_completed(id, outcome),
            Command::RetryDue(id) => self.on_retry_due(id),
            Command::Shutdown => {}
        }
    }

    fn on_save_timer(&mut self) {
        if let Some(flush) = self.buffer.on_tick() {
            self.on_buffer_flush(flush);
        }
        self.sync_save_timer();
    }

    /// Arms or disarms the save timer to match the buffer.
    fn sync_save_timer(&mut self) {
        match (self.buffer.timer_active(), self.save_timer.is_some()) {
            (true, false) => {
                let period = self.config.save_time();
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.save_timer = Some(interval);
            }
            (false, true) => self.save_timer = None,
            _ => {}
        }
    }

    fn on_buffer_flush(&mut self, flush: Flush) -> BatchId {
        let batch = Batch::new(self.ids.next_id(), flush.entries);
        let id = batch.id();
        self.stats.batches_created += 1;
        debug!(
            "COORDINATOR | {} created from {:?} flush with {} entries",
            id,
            flush.reason,
            batch.len()
        );
        self.dispatch(batch);
        id
    }

    fn dispatch(&mut self, batch: Batch) {
        let id = batch.id();
        if !self.registry.insert(batch) {
            warn!("BATCH | {} is already registered, not sending it twice", id);
            return;
        }
        self.start_attempt(id);
    }

    fn start_attempt(&mut self, id: BatchId) {
        let Some(batch) = self.registry.get_mut(id) else {
            return;
        };
        let entries = batch.begin_attempt();
        let attempt = batch.attempts();
        self.stats.send_attempts += 1;
        debug!(
            "BATCH | Sending {} ({} entries, attempt {})",
            id,
            entries.len(),
            attempt
        );

        let transport = Arc::clone(&self.transport);
        let tx = self.weak_tx.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(async move { transport.send(entries).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("BATCH | Transport task for {} failed: {}", id, e);
                    SendOutcome::Failure
                }
            };

            if cancel_token.is_cancelled() {
                debug!("BATCH | Coordinator stopped, discarding outcome for {}", id);
                return;
            }
            match tx.upgrade() {
                Some(tx) => {
                    if tx.send(Command::SendCompleted { id, outcome }).is_err() {
                        debug!("BATCH | Coordinator stopped, discarding outcome for {}", id);
                    }
                }
                None => debug!("BATCH | Coordinator gone, discarding outcome for {}", id),
            }
        });
    }

    fn on_send_completed(&mut self, id: BatchId, outcome: SendOutcome) {
        let Some(batch) = self.registry.get_mut(id) else {
            warn!("BATCH | Outcome for unknown {}, ignoring", id);
            return;
        };
        if batch.state() != BatchState::InFlight {
            warn!(
                "BATCH | Outcome for {} while {:?}, ignoring",
                id,
                batch.state()
            );
            return;
        }

        match outcome {
            SendOutcome::Success => {
                batch.mark_delivered();
                self.registry.remove(id);
                self.stats.delivered += 1;
                debug!("BATCH | {} delivered", id);
            }
            SendOutcome::Failure => {
                match batch.retry(self.config.max_retries(), &self.config.backoff()) {
                    RetryDecision::Retry { retry, delay } => {
                        self.stats.retries_scheduled += 1;
                        debug!(
                            "BATCH | {} retry {}/{} in {:?}",
                            id,
                            retry,
                            self.config.max_retries(),
                            delay
                        );
                        self.schedule_retry(id, delay);
                    }
                    RetryDecision::Exhausted => self.on_permanent_failure(id),
                }
            }
        }
    }

    fn on_permanent_failure(&mut self, id: BatchId) {
        let Some(batch) = self.registry.remove(id) else {
            return;
        };
        self.stats.exhausted += 1;
        error!(
            "BATCH | {} failed after {} attempts, giving up on {} entries",
            id,
            batch.attempts(),
            batch.len()
        );
        self.failure_handler
            .on_permanent_failure(Arc::clone(batch.entries()));
    }

    fn schedule_retry(&self, id: BatchId, delay: Duration) {
        let tx = self.weak_tx.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    debug!("BATCH | Retry timer for {} cancelled", id);
                }
                () = time::sleep(delay) => match tx.upgrade() {
                    Some(tx) => {
                        if tx.send(Command::RetryDue(id)).is_err() {
                            debug!("BATCH | Retry timer for {} fired after teardown, ignoring", id);
                        }
                    }
                    None => debug!("BATCH | Retry timer for {} fired after teardown, ignoring", id),
                },
            }
        });
    }

    fn on_retry_due(&mut self, id: BatchId) {
        match self.registry.get(id).map(Batch::state) {
            Some(BatchState::Retrying) => self.start_attempt(id),
            state => debug!("BATCH | Retry timer for {} found it {:?}, ignoring", id, state),
        }
    }

    fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            in_flight: self.registry.len(),
            buffered: self.buffer.len(),
            ..self.stats
        }
    }

    fn teardown(&mut self) {
        self.cancel_token.cancel();
        self.save_timer = None;
        self.rx.close();

        let buffered = self.buffer.drain();
        if !buffered.is_empty() || !self.registry.is_empty() {
            warn!(
                "COORDINATOR | Stopping with {} buffered entries and {} undelivered batches ({} entries), dropping them",
                buffered.len(),
                self.registry.len(),
                self.registry.entry_count()
            );
            debug!("COORDINATOR | Dropped batches: {:?}", self.registry.ids());
        }
        self.registry.drain();
        debug!("COORDINATOR | Stopped");
    }
}

impl Drop for DeliveryCoordinator {
    fn drop(&mut self) {
        // Retry timers must not outlive the coordinator.
        self.cancel_token.cancel();
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}
