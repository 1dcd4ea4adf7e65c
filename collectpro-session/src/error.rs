//! Session tracking error types.

use collectpro_store::StoreError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("invalid activity timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid session configuration: {0}")]
    Config(String),
}
