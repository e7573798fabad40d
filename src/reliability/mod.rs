pub mod retry;
pub mod worker;

pub use retry::{RetryPolicy, RetryStrategy};
pub use worker::{DeliveryWorker, ShutdownPolicy, WorkerConfig, WorkerState};
