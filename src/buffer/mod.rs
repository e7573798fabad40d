pub mod batch;
pub mod error;
pub mod metrics;
pub mod queue;

pub use batch::{Batch, Payload};
pub use error::BufferError;
pub use metrics::QueueMetrics;
pub use queue::{DeliveryQueue, OverflowPolicy};
