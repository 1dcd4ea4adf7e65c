//! Sync error types.

use crate::timeout::TimeoutError;
use collectpro_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing with the backend.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("backend request failed ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("local storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl SyncError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Transport failures, timeouts, rate limiting and server-side errors
    /// are retryable; client errors and auth failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Backend { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            SyncError::Http(_) | SyncError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if the backend rejected the operation itself, so sending
    /// it again can never succeed: 4xx responses other than 401, 408 and 429,
    /// and operations that are malformed before they are sent.
    pub fn is_permanent(&self) -> bool {
        match self {
            SyncError::Backend { status, .. } => {
                (400..500).contains(status) && !matches!(status, 401 | 408 | 429)
            }
            SyncError::InvalidOperation(_) => true,
            _ => false,
        }
    }

    /// Returns true if the request failed for lack of a usable session.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::AuthRequired
                | SyncError::AuthFailed(_)
                | SyncError::Backend { status: 401, .. }
        )
    }

    /// Returns true if the backend rejected the request for rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::Backend { status: 429, .. })
    }
}
