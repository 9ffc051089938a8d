//! Bounded retry driven by an error classifier
//!
//! The loop only knows how many attempts it may make and how long to wait between
//! them. Whether an error is worth retrying is decided by the caller-supplied
//! classifier, normally [`crate::error::classify`].
//!
//! # Example
//!
//! ```no_run
//! use playlist_sync::config::RetryConfig;
//! use playlist_sync::error::{FetchError, classify};
//! use playlist_sync::retry::retry_classified;
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let attempted = retry_classified(&config, classify, None, |_, _| {}, |attempt| async move {
//!     // Your operation here
//!     Ok::<_, FetchError>(attempt)
//! })
//! .await;
//! assert!(attempted.attempts <= config.max_attempts);
//! # }
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::config::RetryConfig;
use crate::error::FailureKind;

/// Result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Final result
    pub result: Result<T, E>,
    /// Attempts made, always at least 1
    pub attempts: u32,
    /// Classification of the final error, if any
    pub failure: Option<FailureKind>,
}

/// Run `operation` until it succeeds, fails non-transiently, or the attempt budget is spent
///
/// # Arguments
///
/// * `config` - Attempt budget and inter-retry delay schedule
/// * `classify` - Decides whether an error is retried
/// * `pause` - Optional extra politeness delay before each retry
/// * `on_retry` - Called with the failed attempt number and its error before retrying
/// * `operation` - Receives the 1-based attempt number
///
/// Only [`FailureKind::Transient`] errors are retried. Permanent and provider
/// metadata errors return after the attempt that produced them.
pub async fn retry_classified<T, E, F, Fut, C, R>(
    config: &RetryConfig,
    classify: C,
    pause: Option<&dyn Backoff>,
    mut on_retry: R,
    mut operation: F,
) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> FailureKind,
    R: FnMut(u32, &E),
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                    failure: None,
                };
            }
            Err(e) => {
                let kind = classify(&e);
                if kind == FailureKind::Transient && attempt < max_attempts {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    on_retry(attempt, &e);

                    if !delay.is_zero() {
                        let wait = if config.jitter { add_jitter(delay) } else { delay };
                        tokio::time::sleep(wait).await;
                    }
                    if let Some(pause) = pause {
                        pause.delay().await;
                    }

                    let next_delay =
                        Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                    delay = next_delay.min(config.max_delay);
                    continue;
                }

                if kind == FailureKind::Transient {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, kind = ?kind, "Operation failed with non-retryable error");
                }
                return Attempted {
                    result: Err(e),
                    attempts: attempt,
                    failure: Some(kind),
                };
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let jitter_factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
