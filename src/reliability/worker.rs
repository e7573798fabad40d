//! Background delivery loop.
//!
//! One batch is in flight at a time and a batch that is being retried blocks
//! everything queued behind it, so points reach the database in the order
//! they were submitted.

use super::retry::RetryPolicy;
use crate::buffer::{Batch, DeliveryQueue};
use crate::sender::{BatchTransmitter, DeliveryStats, SendOutcome};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happens to queued payloads when the worker is told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Keep delivering until the queue is empty or the deadline passes.
    #[default]
    Drain,
    /// Drop everything still queued.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Sending,
    Retrying,
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_max_items: usize,
    pub batch_max_wait: Duration,
    pub retry: RetryPolicy,
    pub shutdown_policy: ShutdownPolicy,
    pub shutdown_deadline: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_max_items: 10,
            batch_max_wait: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            shutdown_policy: ShutdownPolicy::Drain,
            shutdown_deadline: Duration::from_secs(4),
        }
    }
}

enum Delivery {
    Done,
    Interrupted(Batch),
}

pub struct DeliveryWorker {
    queue: Arc<DeliveryQueue>,
    transmitter: BatchTransmitter,
    config: WorkerConfig,
    shutdown: CancellationToken,
    state: watch::Sender<WorkerState>,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<DeliveryQueue>,
        transmitter: BatchTransmitter,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            queue,
            transmitter,
            config,
            shutdown,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Runs until the shutdown token fires or the queue is closed, then
    /// applies the shutdown policy. Never returns early on delivery errors.
    pub async fn run(self) -> DeliveryStats {
        info!(
            url = %self.transmitter.client().write_url(),
            max_retries = self.config.retry.max_retries,
            "Delivery worker started"
        );

        let mut pending = None;
        loop {
            self.set_state(WorkerState::Idle);
            let payloads = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                payloads = self.queue.dequeue_batch(
                    self.config.batch_max_wait,
                    self.config.batch_max_items,
                ) => payloads,
            };
            if payloads.is_empty() {
                break;
            }

            if let Delivery::Interrupted(batch) = self.deliver(Batch::new(payloads), None).await {
                pending = Some(batch);
                break;
            }
        }

        self.finish(pending).await;
        self.set_state(WorkerState::Stopped);

        let stats = self.transmitter.metrics().snapshot();
        info!(
            acked = stats.payloads_acked,
            dropped = stats.payloads_dropped,
            discarded = stats.discarded_at_shutdown,
            "Delivery worker stopped"
        );
        stats
    }

    async fn deliver(&self, mut batch: Batch, deadline: Option<Instant>) -> Delivery {
        let retry = self.config.retry;
        loop {
            self.set_state(WorkerState::Sending);
            batch.record_attempt();
            let attempt = batch.attempts();
            debug!(
                batch_id = %batch.id(),
                payloads = batch.len(),
                lines = batch.line_count(),
                attempt,
                "Sending batch"
            );

            let Some(outcome) = self
                .interruptible(self.transmitter.send(batch.body()), deadline)
                .await
            else {
                return Delivery::Interrupted(batch);
            };

            match outcome {
                SendOutcome::Acked => {
                    debug!(
                        batch_id = %batch.id(),
                        lines = batch.line_count(),
                        age = ?batch.oldest_age(),
                        "Batch acknowledged"
                    );
                    self.transmitter
                        .metrics()
                        .record_acked(batch.len(), batch.line_count());
                    return Delivery::Done;
                }
                SendOutcome::Dropped(e) => {
                    error!(
                        batch_id = %batch.id(),
                        lines = batch.line_count(),
                        "Dropping batch, server refused it (check database name and credentials): {}",
                        e
                    );
                    self.transmitter
                        .metrics()
                        .record_dropped(batch.len(), &e.to_string());
                    return Delivery::Done;
                }
                SendOutcome::Retrying(e) => {
                    let retries_done = attempt.saturating_sub(1);
                    if !retry.should_retry(retries_done) {
                        error!(
                            batch_id = %batch.id(),
                            lines = batch.line_count(),
                            attempts = attempt,
                            "Dropping batch after exhausting retries: {}",
                            e
                        );
                        self.transmitter
                            .metrics()
                            .record_dropped(batch.len(), &e.to_string());
                        return Delivery::Done;
                    }

                    let delay = retry.delay_for(retries_done + 1);
                    warn!(
                        batch_id = %batch.id(),
                        attempt,
                        "Delivery failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    self.transmitter.metrics().record_retry(&e.to_string());
                    self.set_state(WorkerState::Retrying);
                    if self
                        .interruptible(tokio::time::sleep(delay), deadline)
                        .await
                        .is_none()
                    {
                        return Delivery::Interrupted(batch);
                    }
                }
            }
        }
    }

    /// Before shutdown, races `fut` against the shutdown token; during the
    /// drain, bounds it by the drain deadline instead.
    async fn interruptible<F: Future>(&self, fut: F, deadline: Option<Instant>) -> Option<F::Output> {
        match deadline {
            None => tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                out = fut => Some(out),
            },
            Some(deadline) => timeout_at(deadline, fut).await.ok(),
        }
    }

    async fn finish(&self, pending: Option<Batch>) {
        self.queue.close();

        match self.config.shutdown_policy {
            ShutdownPolicy::Discard => {
                let discarded = pending.map_or(0, |b| b.len()) + self.queue.drain().len();
                self.discard(discarded);
            }
            ShutdownPolicy::Drain => {
                self.set_state(WorkerState::Draining);
                let deadline = Instant::now() + self.config.shutdown_deadline;
                let mut next = pending;
                debug!(
                    queued = self.queue.len(),
                    in_flight = next.is_some(),
                    "Draining delivery queue"
                );
                loop {
                    let batch = match next.take() {
                        Some(batch) => batch,
                        None => {
                            let payloads =
                                self.queue.try_dequeue_batch(self.config.batch_max_items);
                            if payloads.is_empty() {
                                break;
                            }
                            Batch::new(payloads)
                        }
                    };
                    if let Delivery::Interrupted(batch) = self.deliver(batch, Some(deadline)).await
                    {
                        warn!(
                            deadline = ?self.config.shutdown_deadline,
                            "Shutdown deadline reached before the queue drained"
                        );
                        self.discard(batch.len() + self.queue.drain().len());
                        break;
                    }
                }
            }
        }
    }

    fn discard(&self, payloads: usize) {
        if payloads > 0 {
            warn!(payloads, "Discarding undelivered payloads at shutdown");
            self.transmitter.metrics().record_discarded(payloads);
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}
