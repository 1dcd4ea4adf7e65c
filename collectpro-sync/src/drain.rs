//! Replays the offline queue against the backend.
//!
//! Operations are applied oldest first. Transient failures (transport
//! errors, timeouts, 5xx) are retried with the configured backoff; when the
//! retries run out the operation stays at the head of the queue and the pass
//! stops, so later writes never overtake it. An operation the backend
//! rejects outright, or one that has failed `max_attempts` passes, is moved
//! to the dead-letter list so the rest of the queue can proceed.

use crate::error::{SyncError, SyncResult};
use crate::queue::{OfflineQueue, PendingOperation};
use crate::retry::{RetryOptions, retry_when};
use async_trait::async_trait;
use collectpro_store::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Passes an operation may fail before it is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How often the worker retries a stalled queue while online.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Destination for queued operations.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn apply(&self, op: &PendingOperation) -> SyncResult<()>;
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations applied and removed from the queue.
    pub applied: usize,
    /// Operations moved to the dead-letter list.
    pub dead_lettered: usize,
    /// Operations still queued afterwards.
    pub remaining: usize,
    /// Error of the operation that stopped the pass, if any.
    pub last_error: Option<String>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.remaining == 0 && self.last_error.is_none()
    }
}

/// Applies queued operations until the queue is empty or one stalls.
pub async fn drain_queue<S, R>(
    queue: &OfflineQueue<S>,
    remote: &R,
    options: &RetryOptions,
    max_attempts: u32,
) -> SyncResult<DrainReport>
where
    S: LocalStore,
    R: RemoteStore + ?Sized,
{
    let mut report = DrainReport::default();

    while let Some(op) = queue.front()? {
        let err = match retry_when(|| remote.apply(&op), options, SyncError::is_retryable).await {
            Ok(()) => {
                queue.remove(op.id)?;
                report.applied += 1;
                debug!("applied {:?} on {} ({})", op.kind, op.table, op.id);
                continue;
            }
            Err(e) => e,
        };

        if err.is_permanent() {
            queue.dead_letter(op.id, &err.to_string())?;
            report.dead_lettered += 1;
            continue;
        }

        if err.is_auth_error() {
            warn!("stopping drain, no usable session: {err}");
        } else if err.is_rate_limited() {
            warn!("stopping drain, backend is rate limiting: {err}");
        } else if err.is_retryable() {
            if op.attempts + 1 >= max_attempts {
                queue.dead_letter(op.id, &err.to_string())?;
                report.dead_lettered += 1;
                continue;
            }
            warn!(
                "stopping drain at {:?} on {} ({}), attempt {}/{max_attempts}: {err}",
                op.kind,
                op.table,
                op.id,
                op.attempts + 1
            );
            queue.record_attempt(op.id)?;
        } else {
            error!("stopping drain at {:?} on {} ({}): {err}", op.kind, op.table, op.id);
        }
        report.last_error = Some(err.to_string());
        break;
    }

    report.remaining = queue.len()?;
    if report.applied > 0 || report.dead_lettered > 0 {
        info!(
            "drained {} queued operations ({} dead-lettered), {} remaining",
            report.applied, report.dead_lettered, report.remaining
        );
    }
    Ok(report)
}

/// Keeps the queue drained while the device is online.
pub struct SyncWorker<S: LocalStore, R: RemoteStore + ?Sized> {
    queue: Arc<OfflineQueue<S>>,
    remote: Arc<R>,
    options: RetryOptions,
    max_attempts: u32,
    poll_interval: Duration,
}

impl<S: LocalStore, R: RemoteStore + ?Sized> SyncWorker<S, R> {
    pub fn new(queue: Arc<OfflineQueue<S>>, remote: Arc<R>, options: RetryOptions) -> Self {
        Self {
            queue,
            remote,
            options,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs one drain pass now.
    pub async fn drain_now(&self) -> SyncResult<DrainReport> {
        drain_queue(
            &self.queue,
            self.remote.as_ref(),
            &self.options,
            self.max_attempts,
        )
        .await
    }

    /// Drains while online: at start, on every offline → online transition,
    /// whenever the queue changes, and on every poll tick so a stalled queue
    /// is retried. Stops when the connectivity sender is dropped.
    pub async fn run(&self, mut connectivity: watch::Receiver<bool>) {
        info!("sync worker started");
        let mut queue_changes = self.queue.changes();
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip first immediate tick
        poll.tick().await;

        let mut online = *connectivity.borrow_and_update();
        queue_changes.borrow_and_update();
        let mut due = online;

        loop {
            if due && online {
                self.drain_pass(&mut queue_changes).await;
            }
            due = false;

            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *connectivity.borrow_and_update();
                    due = now_online && !online;
                    online = now_online;
                }
                changed = queue_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    queue_changes.borrow_and_update();
                    due = true;
                }
                _ = poll.tick() => {
                    due = true;
                }
            }
        }

        info!("sync worker stopped");
    }

    /// Drains until the queue is empty or a pass stalls. Changes made by
    /// the pass itself are marked seen; anything enqueued meanwhile is
    /// picked up by re-checking the queue.
    async fn drain_pass(&self, queue_changes: &mut watch::Receiver<u64>) {
        loop {
            let result = self.drain_now().await;
            queue_changes.borrow_and_update();
            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!("queue drain failed: {e}");
                    return;
                }
            };
            if !report.is_complete() {
                return;
            }
            match self.queue.is_empty() {
                Ok(true) => return,
                Ok(false) => continue,
                Err(e) => {
                    error!("failed to read queue after drain: {e}");
                    return;
                }
            }
        }
    }
}
