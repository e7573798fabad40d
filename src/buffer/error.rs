use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Invalid queue capacity: {capacity}")]
    InvalidCapacity { capacity: usize },
    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("Queue is closed")]
    Closed,
}
