//! Offline-tolerant sync for CollectPro.
//!
//! Provides:
//! - Retry with exponential backoff and jitter ([`retry`])
//! - A timer race for arbitrary futures ([`timeout`])
//! - Connectivity tracking ([`network`])
//! - The synced / pending / offline status store ([`status`])
//! - A persisted queue of pending writes and its drain loop ([`queue`], [`drain`])
//! - A thin authenticated client for the hosted backend ([`backend`])

pub mod backend;
pub mod config;
pub mod drain;
pub mod error;
pub mod network;
pub mod queue;
pub mod retry;
pub mod status;
pub mod timeout;
pub mod types;

pub use backend::BackendClient;
pub use config::BackendConfig;
pub use drain::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, DrainReport, RemoteStore, SyncWorker, drain_queue,
};
pub use error::{SyncError, SyncResult};
pub use network::NetworkMonitor;
pub use queue::{DeadLetter, OfflineQueue, OperationKind, PendingOperation};
pub use retry::{RetryOptions, retry, retry_when, retry_with};
pub use status::{QueueLengthSource, SyncState, SyncStatus, SyncStatusStore, derive_status};
pub use timeout::{TimeoutError, try_with_timeout, with_timeout};
pub use types::*;
