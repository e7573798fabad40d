use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueMetrics {
    pub capacity: usize,
    pub len: usize,
    pub pushed: u64,
    pub popped: u64,
    /// Enqueues refused because the queue was full or closed.
    pub rejected: u64,
    /// Payloads evicted by [`super::OverflowPolicy::DropOldest`].
    pub evicted: u64,
    pub peak_len: usize,
}

