//! Politeness delay between successive fetches
//!
//! Long sequential batches against a single host trip its rate limiting. The run
//! controller waits on a [`Backoff`] before each item it actually fetches (never
//! before skipped items), and the retry loop can optionally wait on it between
//! attempts of the same item.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::config::BackoffConfig;

/// Delay source used between fetches
///
/// Implementations must be cheap to share; the controller holds one behind an `Arc`.
#[async_trait]
pub trait Backoff: Send + Sync {
    /// Suspend the caller before the next fetch is issued
    async fn delay(&self);

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Uniformly random delay in `[min_delay, max_delay)`
#[derive(Debug, Clone)]
pub struct RandomBackoff {
    min_delay: Duration,
    max_delay: Duration,
}

impl RandomBackoff {
    /// Create a backoff with explicit bounds
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
        }
    }

    /// Draw the next delay
    ///
    /// Degenerate ranges (`max <= min`) always yield `min_delay`.
    pub fn next_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl From<&BackoffConfig> for RandomBackoff {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.min_delay, config.max_delay)
    }
}

#[async_trait]
impl Backoff for RandomBackoff {
    async fn delay(&self) {
        let delay = self.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Pausing before next fetch");
        tokio::time::sleep(delay).await;
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Backoff that never waits
///
/// Useful for tests and for local mirrors that do not rate limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

#[async_trait]
impl Backoff for NoBackoff {
    async fn delay(&self) {}

    fn name(&self) -> &'static str {
        "none"
    }
}
