//! The forwarder service: synchronous `submit` on the producer side, one
//! background delivery worker on the other.

use super::config::{BindingFilter, ForwarderConfig};
use crate::buffer::{BufferError, DeliveryQueue, Payload, QueueMetrics};
use crate::domain::{Binding, Record};
use crate::protocol::LineProtocolFormatter;
use crate::reliability::{DeliveryWorker, WorkerState};
use crate::sender::{
    BatchTransmitter, ClientError, DatabaseProvisioner, DeliveryStats, HttpClient,
    MetricsCollector,
};
use crate::transform::RecordTransformer;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Extra time granted to the worker beyond its own drain deadline.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP client error: {0}")]
    Client(#[from] ClientError),
    #[error("Queue error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Delivery worker failed: {0}")]
    WorkerFailed(String),
    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,
}

/// What `submit` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Enqueued,
    /// The binding is not forwarded.
    Filtered,
    /// No observation survived the transform; nothing was enqueued.
    Empty,
    /// The queue refused the payload.
    Rejected,
}

struct Pipeline {
    transformer: RecordTransformer,
    formatter: LineProtocolFormatter,
    binding_filter: BindingFilter,
    queue: Arc<DeliveryQueue>,
}

/// Cloneable producer-side entry point; safe to move to other threads.
#[derive(Clone)]
pub struct SubmitHandle {
    pipeline: Arc<Pipeline>,
}

impl SubmitHandle {
    /// Transforms, serializes and enqueues `record`. Never blocks on the
    /// network and never fails; problems are logged and reported in the
    /// returned outcome.
    pub fn submit(&self, record: &Record, binding: Binding) -> SubmitOutcome {
        let p = &self.pipeline;
        if !p.binding_filter.accepts(binding) {
            trace!(%binding, "binding not forwarded");
            return SubmitOutcome::Filtered;
        }

        let point = p.transformer.transform(record, binding);
        let Some(lines) = p.formatter.format(&point) else {
            debug!(
                %binding,
                timestamp = record.timestamp().secs(),
                "record has no uploadable observations, skipping"
            );
            return SubmitOutcome::Empty;
        };

        let payload = Payload::new(lines, binding);
        let payload_id = payload.id();
        match p.queue.try_enqueue(payload) {
            Ok(()) => {
                trace!(%payload_id, fields = point.field_count(), "payload enqueued");
                SubmitOutcome::Enqueued
            }
            Err(e) => {
                warn!(
                    %binding,
                    timestamp = record.timestamp().secs(),
                    "Dropping record: {}",
                    e
                );
                SubmitOutcome::Rejected
            }
        }
    }

    pub fn queue_len(&self) -> usize {
        self.pipeline.queue.len()
    }
}

pub struct Forwarder {
    handle: SubmitHandle,
    queue: Arc<DeliveryQueue>,
    metrics: MetricsCollector,
    shutdown: CancellationToken,
    shutdown_deadline: Duration,
    state: watch::Receiver<WorkerState>,
    worker: Option<JoinHandle<DeliveryStats>>,
}

impl Forwarder {
    /// Provisions the database (bounded and non-fatal) and spawns the
    /// delivery worker. Must be called inside a tokio runtime.
    pub async fn start(config: ForwarderConfig) -> Result<Self, ServiceError> {
        let client = HttpClient::new(config.client.clone())?;

        if config.create_database && !config.skip_upload {
            let provisioner = DatabaseProvisioner::new(
                client.clone(),
                config.admin_credentials.clone(),
                config.provision_timeout,
            );
            if let Err(e) = provisioner.ensure_database().await {
                error!(
                    database = client.database(),
                    "Failed to create database, writes will fail until it exists: {}",
                    e
                );
            }
        }

        let queue = Arc::new(DeliveryQueue::new(
            config.queue_capacity,
            config.overflow_policy,
        )?);
        let metrics = MetricsCollector::new();
        let transmitter =
            BatchTransmitter::new(client, metrics.clone()).with_skip_upload(config.skip_upload);
        let shutdown = CancellationToken::new();

        let worker = DeliveryWorker::new(
            queue.clone(),
            transmitter,
            config.worker.clone(),
            shutdown.clone(),
        );
        let state = worker.subscribe();
        let worker = tokio::spawn(worker.run());

        info!(
            url = %config.client.server_url,
            database = %config.client.database,
            line_format = %config.line_format,
            binding = ?config.binding_filter,
            skip_upload = config.skip_upload,
            "Forwarder started"
        );

        let handle = SubmitHandle {
            pipeline: Arc::new(Pipeline {
                transformer: config.transformer,
                formatter: LineProtocolFormatter::new(config.line_format),
                binding_filter: config.binding_filter,
                queue: queue.clone(),
            }),
        };

        Ok(Self {
            handle,
            queue,
            metrics,
            shutdown,
            shutdown_deadline: config.worker.shutdown_deadline,
            state,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, record: &Record, binding: Binding) -> SubmitOutcome {
        self.handle.submit(record, binding)
    }

    pub fn handle(&self) -> SubmitHandle {
        self.handle.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn queue_metrics(&self) -> QueueMetrics {
        self.queue.metrics()
    }

    pub fn delivery_stats(&self) -> DeliveryStats {
        self.metrics.snapshot()
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Stops the worker, applying its shutdown policy, and returns the final
    /// delivery counters.
    pub async fn shutdown(mut self) -> Result<DeliveryStats, ServiceError> {
        info!(queued = self.queue.len(), "Initiating graceful shutdown...");
        self.shutdown.cancel();

        let Some(mut worker) = self.worker.take() else {
            return Ok(self.metrics.snapshot());
        };

        match tokio::time::timeout(self.shutdown_deadline + SHUTDOWN_GRACE, &mut worker).await {
            Ok(Ok(stats)) => {
                info!("Graceful shutdown completed");
                Ok(stats)
            }
            Ok(Err(e)) => Err(ServiceError::WorkerFailed(e.to_string())),
            Err(_) => {
                worker.abort();
                error!("Shutdown timeout exceeded");
                Err(ServiceError::ShutdownTimeout)
            }
        }
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
