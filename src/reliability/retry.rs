use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

/// Per-batch retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a batch gets `max_retries + 1` POSTs.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::Exponential,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (1-based). Never exceeds `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let step = retry.max(1);
        let base_ms = self.base_delay.as_millis() as u64;
        let raw_ms = match self.strategy {
            RetryStrategy::Exponential => 2_u64
                .checked_pow(step - 1)
                .map_or(u64::MAX, |m| base_ms.saturating_mul(m)),
            RetryStrategy::Linear => base_ms.saturating_mul(step as u64),
            RetryStrategy::Fixed => base_ms,
        };

        let capped = Duration::from_millis(raw_ms).min(self.max_delay);
        if self.jitter {
            apply_jitter(capped).min(self.max_delay)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let factor = rng.random_range(0.5..1.5); // ±50%
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}
