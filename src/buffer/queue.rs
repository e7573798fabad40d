use super::batch::Payload;
use super::error::BufferError;
use super::metrics::QueueMetrics;
use clap::ValueEnum;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

/// What a full queue does with a new payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Refuse the new payload.
    #[default]
    Reject,
    /// Evict the oldest queued payload to make room.
    DropOldest,
}

/// Bounded FIFO between producers and the delivery worker.
///
/// Producers never wait: `enqueue` takes a short lock and returns. The single
/// consumer parks on a [`Notify`] while the queue is empty.
#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Payload>>,
    notify: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
    closed: AtomicBool,
    pushed: AtomicU64,
    popped: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    peak_len: AtomicUsize,
}

impl DeliveryQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity { capacity });
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            overflow,
            closed: AtomicBool::new(false),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            peak_len: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Non-blocking enqueue. `false` means the payload was not accepted.
    pub fn enqueue(&self, payload: Payload) -> bool {
        self.try_enqueue(payload).is_ok()
    }

    pub fn try_enqueue(&self, payload: Payload) -> Result<(), BufferError> {
        if self.is_closed() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(BufferError::Closed);
        }

        let len = {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                match self.overflow {
                    OverflowPolicy::Reject => {
                        self.rejected.fetch_add(1, Ordering::Relaxed);
                        return Err(BufferError::Full {
                            capacity: self.capacity,
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = items.pop_front() {
                            self.evicted.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                payload_id = %evicted.id(),
                                lines = evicted.line_count(),
                                "Delivery queue full, evicting oldest payload"
                            );
                        }
                    }
                }
            }
            items.push_back(payload);
            items.len()
        };

        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.peak_len.fetch_max(len, Ordering::Relaxed);
        self.notify.notify_one();
        Ok(())
    }

    /// Waits until at least one payload is queued, then gives producers up to
    /// `max_wait` to add more, and takes at most `max_items` from the front.
    ///
    /// Returns an empty vector once the queue is closed and empty. Payloads
    /// stay queued until the final take, so dropping the future loses nothing.
    pub async fn dequeue_batch(&self, max_wait: Duration, max_items: usize) -> Vec<Payload> {
        let max_items = max_items.clamp(1, self.capacity);

        loop {
            if !self.is_empty() {
                break;
            }
            if self.is_closed() {
                return Vec::new();
            }
            self.notify.notified().await;
        }

        if !max_wait.is_zero() {
            let deadline = Instant::now() + max_wait;
            while self.len() < max_items && !self.is_closed() {
                if timeout_at(deadline, self.notify.notified()).await.is_err() {
                    break;
                }
            }
        }

        self.take(max_items)
    }

    /// Takes up to `max_items` without waiting.
    pub fn try_dequeue_batch(&self, max_items: usize) -> Vec<Payload> {
        self.take(max_items.max(1))
    }

    /// Removes everything still queued.
    pub fn drain(&self) -> Vec<Payload> {
        self.take(usize::MAX)
    }

    /// Refuses further payloads and wakes the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            capacity: self.capacity,
            len: self.len(),
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            peak_len: self.peak_len.load(Ordering::Relaxed),
        }
    }

    fn take(&self, max_items: usize) -> Vec<Payload> {
        let taken: Vec<Payload> = {
            let mut items = self.items.lock();
            let n = items.len().min(max_items);
            items.drain(..n).collect()
        };
        self.popped.fetch_add(taken.len() as u64, Ordering::Relaxed);
        taken
    }
}
