//! Retry with exponential backoff for transient E-utilities failures
//!
//! Connect errors, timeouts, 5xx and 429 responses are retried. Anything the
//! server answered deliberately (4xx, malformed payloads) is returned at once.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

/// Classifies errors for the retry loop
pub trait RetryableError {
    /// Whether another attempt could succeed
    fn is_retryable(&self) -> bool;

    /// Short human readable reason, used in logs
    fn retry_reason(&self) -> &str;
}

/// Backoff policy for API requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Fraction of each delay that is randomized (0.0 - 1.0)
    pub jitter: f64,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delays between attempts, in order
    pub(crate) fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        // ExponentialBackoff yields base^n * factor; base 2 doubles each step
        let factor = (self.initial_delay.as_millis() as u64 / 2).max(1);
        let jitter = self.jitter;
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(move |delay| apply_jitter(delay, jitter))
            .take(self.max_retries)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.1,
        }
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let spread = delay.as_secs_f64() * jitter;
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    description: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0usize;
    let result = RetryIf::start(
        config.delays(),
        || {
            attempt += 1;
            debug!(attempt, operation = description, "Attempting request");
            operation()
        },
        |err: &E| {
            let retry = err.is_retryable();
            if retry {
                warn!(
                    operation = description,
                    reason = err.retry_reason(),
                    error = %err,
                    "Transient failure, retrying"
                );
            }
            retry
        },
    )
    .await;

    if let Err(err) = &result {
        debug!(operation = description, error = %err, "Giving up");
    }
    result
}
