//! Race a future against a timer.
//!
//! The timer lives inside the returned future: when either side settles the
//! timer is dropped with it, so nothing stays scheduled. When the timer wins
//! only the wait ends; the wrapped future is dropped without further polling.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Message used when the caller does not supply one.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "operation timed out";

/// The timer fired before the operation settled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TimeoutError {
    pub message: String,
    pub limit: Duration,
}

/// Resolves to the output of `future`, or fails with [`TimeoutError`] if
/// `limit` elapses first.
pub async fn with_timeout<F>(
    future: F,
    limit: Duration,
    message: Option<&str>,
) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimeoutError {
            message: message.unwrap_or(DEFAULT_TIMEOUT_MESSAGE).to_string(),
            limit,
        })
}

/// Like [`with_timeout`] for fallible futures, folding the timeout into the
/// operation's own error type.
pub async fn try_with_timeout<F, T, E>(
    future: F,
    limit: Duration,
    message: Option<&str>,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    with_timeout(future, limit, message).await?
}
