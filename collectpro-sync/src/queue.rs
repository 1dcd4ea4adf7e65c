//! Persisted queue of writes waiting to reach the backend.
//!
//! Operations are kept in local storage as a JSON array in arrival order.
//! Every mutation is a read-modify-write under one lock and bumps a version
//! counter published on a `watch` channel, so any number of observers (the
//! status store, the sync worker) can re-read the queue.
//!
//! Operations the backend will never accept are moved to a dead-letter list
//! stored under `<key>_dead` instead of blocking the queue.

use crate::error::{SyncError, SyncResult};
use crate::status::QueueLengthSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collectpro_store::{LocalStore, OFFLINE_QUEUE_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error};
use uuid::Uuid;

/// What a queued operation does against its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    /// Remote function call; `table` holds the function name.
    Rpc,
}

/// A write recorded while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: Uuid,
    pub table: String,
    pub kind: OperationKind,
    #[serde(default)]
    pub payload: Value,
    /// Row filter in query-string form, e.g. `id=eq.42`.
    #[serde(default)]
    pub filter: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingOperation {
    fn new(table: &str, kind: OperationKind, payload: Value, filter: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            table: table.to_string(),
            kind,
            payload,
            filter,
            created_at: Utc::now(),
            attempts: 0,
        }
    }

    pub fn insert(table: &str, row: Value) -> Self {
        Self::new(table, OperationKind::Insert, row, None)
    }

    pub fn update(table: &str, filter: &str, patch: Value) -> Self {
        Self::new(table, OperationKind::Update, patch, Some(filter.to_string()))
    }

    pub fn delete(table: &str, filter: &str) -> Self {
        Self::new(table, OperationKind::Delete, Value::Null, Some(filter.to_string()))
    }

    pub fn rpc(function: &str, args: Value) -> Self {
        Self::new(function, OperationKind::Rpc, args, None)
    }

    /// Returns the filter, failing for kinds that cannot run without one.
    pub fn required_filter(&self) -> SyncResult<&str> {
        match self.filter.as_deref() {
            Some(filter) if !filter.trim().is_empty() => Ok(filter),
            _ => Err(SyncError::InvalidOperation(format!(
                "{:?} on {} requires a row filter",
                self.kind, self.table
            ))),
        }
    }
}

/// An operation removed from the queue after it could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub operation: PendingOperation,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Ordered, persisted list of pending operations.
pub struct OfflineQueue<S: LocalStore> {
    store: Arc<S>,
    key: String,
    dead_key: String,
    lock: Mutex<()>,
    version: watch::Sender<u64>,
}

impl<S: LocalStore> OfflineQueue<S> {
    /// Creates a queue stored under the default key.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, OFFLINE_QUEUE_KEY)
    }

    pub fn with_key(store: Arc<S>, key: &str) -> Self {
        let (version, _rx) = watch::channel(0);
        Self {
            store,
            key: key.to_string(),
            dead_key: format!("{key}_dead"),
            lock: Mutex::new(()),
            version,
        }
    }

    /// Receiver whose value changes after every mutation.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn load(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self
            .store
            .load_json::<Vec<PendingOperation>>(&self.key)?
            .unwrap_or_default())
    }

    fn save(&self, ops: &[PendingOperation]) -> SyncResult<()> {
        if ops.is_empty() {
            self.store.remove_item(&self.key)?;
        } else {
            self.store.save_json(&self.key, &ops)?;
        }
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        Ok(())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<PendingOperation>) -> R) -> SyncResult<R> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ops = self.load()?;
        let result = f(&mut ops);
        self.save(&ops)?;
        Ok(result)
    }

    /// Appends an operation and returns the new length.
    pub fn enqueue(&self, op: PendingOperation) -> SyncResult<usize> {
        debug!("queueing {:?} on {} ({})", op.kind, op.table, op.id);
        self.mutate(|ops| {
            ops.push(op);
            ops.len()
        })
    }

    pub fn len(&self) -> SyncResult<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns every queued operation, oldest first.
    pub fn peek_all(&self) -> SyncResult<Vec<PendingOperation>> {
        self.load()
    }

    /// Returns the oldest queued operation.
    pub fn front(&self) -> SyncResult<Option<PendingOperation>> {
        Ok(self.load()?.into_iter().next())
    }

    /// Removes an operation by id. Returns false if it was not queued.
    pub fn remove(&self, id: Uuid) -> SyncResult<bool> {
        self.mutate(|ops| {
            let before = ops.len();
            ops.retain(|op| op.id != id);
            ops.len() != before
        })
    }

    /// Increments the attempt counter of an operation.
    pub fn record_attempt(&self, id: Uuid) -> SyncResult<()> {
        self.mutate(|ops| {
            if let Some(op) = ops.iter_mut().find(|op| op.id == id) {
                op.attempts += 1;
            }
        })
    }

    /// Drops every queued operation.
    pub fn clear(&self) -> SyncResult<()> {
        self.mutate(Vec::clear)
    }

    /// Moves an operation to the dead-letter list. Returns false if it was
    /// not queued.
    pub fn dead_letter(&self, id: Uuid, reason: &str) -> SyncResult<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ops = self.load()?;
        let Some(pos) = ops.iter().position(|op| op.id == id) else {
            return Ok(false);
        };

        let mut dead = self.dead_letters()?;
        let operation = ops.remove(pos);
        error!(
            "giving up on {:?} on {} ({}) after {} attempts: {reason}",
            operation.kind, operation.table, operation.id, operation.attempts
        );
        dead.push(DeadLetter {
            operation,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        self.store.save_json(&self.dead_key, &dead)?;
        self.save(&ops)?;
        Ok(true)
    }

    /// Operations that were given up on, oldest first.
    pub fn dead_letters(&self) -> SyncResult<Vec<DeadLetter>> {
        Ok(self
            .store
            .load_json::<Vec<DeadLetter>>(&self.dead_key)?
            .unwrap_or_default())
    }

    pub fn clear_dead_letters(&self) -> SyncResult<()> {
        self.store.remove_item(&self.dead_key)?;
        Ok(())
    }
}

#[async_trait]
impl<S: LocalStore> QueueLengthSource for OfflineQueue<S> {
    async fn queue_length(&self) -> SyncResult<usize> {
        self.len()
    }
}
