use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of the delivery counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryStats {
    pub attempts: u64,
    pub retries: u64,
    pub batches_acked: u64,
    pub batches_dropped: u64,
    pub payloads_acked: u64,
    pub payloads_dropped: u64,
    pub lines_acked: u64,
    pub bytes_sent: u64,
    pub discarded_at_shutdown: u64,
    #[serde(skip)]
    pub average_latency: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    retries: AtomicU64,
    batches_acked: AtomicU64,
    batches_dropped: AtomicU64,
    payloads_acked: AtomicU64,
    payloads_dropped: AtomicU64,
    lines_acked: AtomicU64,
    bytes_sent: AtomicU64,
    discarded_at_shutdown: AtomicU64,
    total_latency_us: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, bytes: usize, latency: Duration) {
        let c = &self.inner;
        c.attempts.fetch_add(1, Ordering::Relaxed);
        c.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        c.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_retry(&self, error: &str) {
        self.inner.retries.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_error.lock() = Some(error.to_string());
    }

    pub fn record_acked(&self, payloads: usize, lines: usize) {
        let c = &self.inner;
        c.batches_acked.fetch_add(1, Ordering::Relaxed);
        c.payloads_acked.fetch_add(payloads as u64, Ordering::Relaxed);
        c.lines_acked.fetch_add(lines as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, payloads: usize, error: &str) {
        let c = &self.inner;
        c.batches_dropped.fetch_add(1, Ordering::Relaxed);
        c.payloads_dropped.fetch_add(payloads as u64, Ordering::Relaxed);
        *c.last_error.lock() = Some(error.to_string());
    }

    pub fn record_discarded(&self, payloads: usize) {
        self.inner
            .discarded_at_shutdown
            .fetch_add(payloads as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliveryStats {
        let c = &self.inner;
        let attempts = c.attempts.load(Ordering::Relaxed);
        let average_latency = if attempts > 0 {
            Duration::from_micros(c.total_latency_us.load(Ordering::Relaxed) / attempts)
        } else {
            Duration::ZERO
        };

        DeliveryStats {
            attempts,
            retries: c.retries.load(Ordering::Relaxed),
            batches_acked: c.batches_acked.load(Ordering::Relaxed),
            batches_dropped: c.batches_dropped.load(Ordering::Relaxed),
            payloads_acked: c.payloads_acked.load(Ordering::Relaxed),
            payloads_dropped: c.payloads_dropped.load(Ordering::Relaxed),
            lines_acked: c.lines_acked.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            discarded_at_shutdown: c.discarded_at_shutdown.load(Ordering::Relaxed),
            average_latency,
            last_error: c.last_error.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_averages_latency() {
        let metrics = MetricsCollector::new();
        metrics.record_attempt(100, Duration::from_millis(10));
        metrics.record_attempt(50, Duration::from_millis(30));
        metrics.record_acked(2, 5);

        let stats = metrics.snapshot();
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.bytes_sent, 150);
        assert_eq!(stats.payloads_acked, 2);
        assert_eq!(stats.lines_acked, 5);
        assert_eq!(stats.average_latency, Duration::from_millis(20));
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = MetricsCollector::new();
        let clone = metrics.clone();
        clone.record_dropped(1, "HTTP 400");
        let stats = metrics.snapshot();
        assert_eq!(stats.payloads_dropped, 1);
        assert_eq!(stats.last_error.as_deref(), Some("HTTP 400"));
    }
}
