//! Sync status derivation.
//!
//! The status is a pure function of connectivity and the pending-queue
//! length:
//! - offline whenever the network is down
//! - pending when online with queued operations
//! - synced otherwise
//!
//! [`SyncStatusStore`] keeps the two inputs, recomputes the status on every
//! event that touches them and publishes the result on a `watch` channel.

use crate::error::SyncResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tri-state sync indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Derives the status from its two inputs.
pub fn derive_status(is_online: bool, queue_length: usize) -> SyncStatus {
    if !is_online {
        SyncStatus::Offline
    } else if queue_length > 0 {
        SyncStatus::Pending
    } else {
        SyncStatus::Synced
    }
}

/// Snapshot published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub is_online: bool,
    pub queue_length: usize,
    pub status: SyncStatus,
}

impl SyncState {
    pub fn new(is_online: bool, queue_length: usize) -> Self {
        Self {
            is_online,
            queue_length,
            status: derive_status(is_online, queue_length),
        }
    }
}

/// Anything that can report how many operations are waiting to sync.
#[async_trait]
pub trait QueueLengthSource: Send + Sync {
    async fn queue_length(&self) -> SyncResult<usize>;
}

/// Holds connectivity and queue length, and the status derived from them.
pub struct SyncStatusStore {
    source: Arc<dyn QueueLengthSource>,
    is_online: bool,
    queue_length: usize,
    tx: watch::Sender<SyncState>,
}

impl SyncStatusStore {
    /// Creates the store with the status seeded from `is_online` alone.
    /// Call [`initialize`](Self::initialize) to read the queue.
    pub fn new(source: Arc<dyn QueueLengthSource>, is_online: bool) -> Self {
        let (tx, _rx) = watch::channel(SyncState::new(is_online, 0));
        Self {
            source,
            is_online,
            queue_length: 0,
            tx,
        }
    }

    /// Creates the store and runs the initial queue check.
    pub async fn start(source: Arc<dyn QueueLengthSource>, is_online: bool) -> Self {
        let mut store = Self::new(source, is_online);
        store.initialize().await;
        store
    }

    /// Runs the initial queue check.
    pub async fn initialize(&mut self) -> SyncState {
        self.refresh_queue_length().await
    }

    /// Current snapshot.
    pub fn state(&self) -> SyncState {
        *self.tx.borrow()
    }

    pub fn status(&self) -> SyncStatus {
        self.state().status
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn queue_length(&self) -> usize {
        self.queue_length
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.tx.subscribe()
    }

    /// Re-reads the queue length and recomputes the status. A failed read
    /// keeps the previous length.
    pub async fn refresh_queue_length(&mut self) -> SyncState {
        match self.source.queue_length().await {
            Ok(len) => self.queue_length = len,
            Err(e) => warn!(
                "failed to read pending queue, keeping length {}: {e}",
                self.queue_length
            ),
        }
        self.recompute_status()
    }

    /// Derives the status from the current inputs and publishes it.
    pub fn recompute_status(&mut self) -> SyncState {
        let state = SyncState::new(self.is_online, self.queue_length);
        let previous = self.tx.send_replace(state);
        if previous.status != state.status {
            debug!("sync status {} -> {}", previous.status, state.status);
        }
        state
    }

    /// Applies a connectivity change. Going online re-reads the queue since
    /// it may need draining; going offline recomputes immediately and
    /// assumes the queue is unchanged.
    pub async fn set_online(&mut self, online: bool) -> SyncState {
        if online == self.is_online {
            return self.state();
        }
        self.is_online = online;
        if online {
            info!("back online, checking pending queue");
            self.refresh_queue_length().await
        } else {
            self.recompute_status()
        }
    }

    /// Follows `connectivity` and `queue_changes` until the connectivity
    /// sender is dropped. Starts by adopting the current connectivity flag
    /// and reading the queue, so the first published state is accurate.
    pub async fn run(
        &mut self,
        mut connectivity: watch::Receiver<bool>,
        mut queue_changes: watch::Receiver<u64>,
    ) {
        self.is_online = *connectivity.borrow_and_update();
        queue_changes.borrow_and_update();
        self.refresh_queue_length().await;

        loop {
            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        debug!("connectivity source closed, stopping status updates");
                        break;
                    }
                    let online = *connectivity.borrow_and_update();
                    self.set_online(online).await;
                }
                changed = queue_changes.changed() => {
                    if changed.is_err() {
                        debug!("queue dropped, stopping status updates");
                        break;
                    }
                    queue_changes.borrow_and_update();
                    self.refresh_queue_length().await;
                }
            }
        }
    }
}
