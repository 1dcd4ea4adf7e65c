//! Retry with exponential backoff and jitter.
//!
//! An operation is attempted up to `retries + 1` times. Between attempts the
//! wait is `delay ± delay * jitter * U(-0.5, 0.5)`, never negative, and
//! `delay` is multiplied by `factor` after every wait. Only the final
//! attempt's error reaches the caller. [`retry_when`] additionally stops at
//! the first error the caller classifies as permanent.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for [`retry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retries after the first attempt.
    pub retries: u32,

    /// Wait before the first retry, in milliseconds.
    pub delay_ms: u64,

    /// Multiplier applied to the wait after each retry.
    pub factor: f64,

    /// Relative spread of the random perturbation (0.2 = ±10%).
    pub jitter: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            delay_ms: 300,
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryOptions {
    /// Options that try exactly once.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait before the first retry.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Applies jitter to `delay`. `unit` is a sample from `[-0.5, 0.5)`.
pub fn jittered(delay: Duration, jitter: f64, unit: f64) -> Duration {
    let base = delay.as_secs_f64();
    let wait = (base + base * jitter * unit).max(0.0);
    Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX)
}

fn scaled(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64((delay.as_secs_f64() * factor).max(0.0)).unwrap_or(Duration::MAX)
}

/// Runs `operation` until it succeeds or the attempts run out.
pub async fn retry<T, E, F, Fut>(operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with(operation, options, |_, _| Ok(())).await
}

/// Like [`retry`], but gives up immediately on an error for which
/// `retryable` returns false.
pub async fn retry_when<T, E, F, Fut, P>(
    operation: F,
    options: &RetryOptions,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    run(operation, options, |_, _| Ok(()), retryable).await
}

/// Like [`retry`], calling `on_retry(attempt, &error)` after every failed
/// attempt that will be retried. `attempt` is 1-based. Errors returned by
/// the callback are logged and otherwise ignored.
pub async fn retry_with<T, E, F, Fut, R>(
    operation: F,
    options: &RetryOptions,
    on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: FnMut(u32, &E) -> anyhow::Result<()>,
{
    run(operation, options, on_retry, |_| true).await
}

async fn run<T, E, F, Fut, R, P>(
    mut operation: F,
    options: &RetryOptions,
    mut on_retry: R,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: FnMut(u32, &E) -> anyhow::Result<()>,
    P: Fn(&E) -> bool,
{
    let max_attempts = options.max_attempts();
    let mut delay = options.delay();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("operation succeeded on attempt {attempt}/{max_attempts}");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) if !retryable(&e) => {
                debug!("attempt {attempt}/{max_attempts} failed permanently: {e}");
                return Err(e);
            }
            Err(e) => e,
        };

        if let Err(callback_err) = on_retry(attempt, &err) {
            warn!("retry callback failed on attempt {attempt}: {callback_err}");
        }

        let unit = rand::rng().random_range(-0.5..0.5);
        let wait = jittered(delay, options.jitter, unit);
        debug!("attempt {attempt}/{max_attempts} failed: {err}; retrying in {wait:?}");
        tokio::time::sleep(wait).await;
        delay = scaled(delay, options.factor);
    }
}
