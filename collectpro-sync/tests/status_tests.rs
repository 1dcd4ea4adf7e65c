use async_trait::async_trait;
use collectpro_store::MemoryStore;
use collectpro_sync::{
    NetworkMonitor, OfflineQueue, PendingOperation, QueueLengthSource, SyncError, SyncResult,
    SyncState, SyncStatus, SyncStatusStore, derive_status,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Queue stand-in whose length and failure mode tests control directly.
#[derive(Default)]
struct FakeQueue {
    len: AtomicUsize,
    fail: AtomicBool,
    reads: AtomicUsize,
}

impl FakeQueue {
    fn with_len(len: usize) -> Arc<Self> {
        let q = Self::default();
        q.len.store(len, Ordering::SeqCst);
        Arc::new(q)
    }

    fn set_len(&self, len: usize) {
        self.len.store(len, Ordering::SeqCst);
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueLengthSource for FakeQueue {
    async fn queue_length(&self) -> SyncResult<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::InvalidOperation("queue store unavailable".into()));
        }
        Ok(self.len.load(Ordering::SeqCst))
    }
}

// ── Derivation ───────────────────────────────────────────────────

#[test]
fn derivation_table() {
    assert_eq!(derive_status(false, 0), SyncStatus::Offline);
    assert_eq!(derive_status(false, 3), SyncStatus::Offline);
    assert_eq!(derive_status(true, 0), SyncStatus::Synced);
    assert_eq!(derive_status(true, 3), SyncStatus::Pending);
}

proptest! {
    #[test]
    fn derivation_invariant(online in any::<bool>(), len in 0usize..10_000) {
        let status = derive_status(online, len);
        prop_assert_eq!(status == SyncStatus::Offline, !online);
        if online {
            prop_assert_eq!(status == SyncStatus::Pending, len > 0);
        }
        let state = SyncState::new(online, len);
        prop_assert_eq!(state.status, status);
    }
}

#[test]
fn status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&SyncStatus::Pending).unwrap(), "\"pending\"");
    assert_eq!(SyncStatus::Offline.to_string(), "offline");
}

// ── Store ────────────────────────────────────────────────────────

#[tokio::test]
async fn construction_seeds_from_connectivity_without_reading() {
    let queue = FakeQueue::with_len(5);
    let store = SyncStatusStore::new(queue.clone(), false);
    assert_eq!(store.status(), SyncStatus::Offline);
    assert_eq!(queue.reads(), 0);

    let store = SyncStatusStore::new(queue.clone(), true);
    assert_eq!(store.status(), SyncStatus::Synced);
    assert_eq!(queue.reads(), 0);
}

#[tokio::test]
async fn initialize_reads_queue_once() {
    let queue = FakeQueue::with_len(2);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    let state = store.initialize().await;
    assert_eq!(state, SyncState { is_online: true, queue_length: 2, status: SyncStatus::Pending });
    assert_eq!(queue.reads(), 1);
}

#[tokio::test]
async fn failed_read_keeps_previous_length() {
    let queue = FakeQueue::with_len(4);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    store.initialize().await;

    queue.set_len(0);
    queue.set_failing(true);
    let state = store.refresh_queue_length().await;

    assert_eq!(state.queue_length, 4);
    assert_eq!(state.status, SyncStatus::Pending);
}

#[tokio::test]
async fn failed_initial_read_still_publishes_status() {
    let queue = FakeQueue::with_len(4);
    queue.set_failing(true);
    let mut store = SyncStatusStore::new(queue, true);
    let state = store.initialize().await;
    assert_eq!(state.status, SyncStatus::Synced);
    assert_eq!(state.queue_length, 0);
}

#[tokio::test]
async fn going_offline_does_not_read_queue() {
    let queue = FakeQueue::with_len(0);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    store.initialize().await;
    let reads = queue.reads();

    let state = store.set_online(false).await;
    assert_eq!(state.status, SyncStatus::Offline);
    assert_eq!(queue.reads(), reads);
}

#[tokio::test]
async fn going_online_reads_queue() {
    let queue = FakeQueue::with_len(0);
    let mut store = SyncStatusStore::new(queue.clone(), false);
    store.initialize().await;
    let reads = queue.reads();

    store.set_online(true).await;
    assert_eq!(queue.reads(), reads + 1);
}

#[tokio::test]
async fn repeated_flag_is_not_a_transition() {
    let queue = FakeQueue::with_len(0);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    store.set_online(true).await;
    assert_eq!(queue.reads(), 0);
}

#[tokio::test]
async fn offline_online_round_trip() {
    let queue = FakeQueue::with_len(0);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    store.initialize().await;
    assert_eq!(store.status(), SyncStatus::Synced);

    assert_eq!(store.set_online(false).await.status, SyncStatus::Offline);
    assert_eq!(store.set_online(true).await.status, SyncStatus::Synced);

    store.set_online(false).await;
    queue.set_len(3);
    assert_eq!(store.set_online(true).await.status, SyncStatus::Pending);
}

#[tokio::test]
async fn subscribers_see_updates() {
    let queue = FakeQueue::with_len(1);
    let mut store = SyncStatusStore::new(queue, true);
    let mut rx = store.subscribe();

    store.initialize().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status, SyncStatus::Pending);

    store.set_online(false).await;
    assert_eq!(rx.borrow_and_update().status, SyncStatus::Offline);
}

// ── Driven by monitor and queue ──────────────────────────────────

#[tokio::test]
async fn run_follows_network_and_queue() {
    let backing = Arc::new(MemoryStore::new());
    let queue = Arc::new(OfflineQueue::new(backing));
    let monitor = NetworkMonitor::new(true);
    let mut store = SyncStatusStore::new(queue.clone(), monitor.is_online());
    let mut rx = store.subscribe();

    let connectivity = monitor.subscribe();
    let changes = queue.changes();
    let task = tokio::spawn(async move {
        store.run(connectivity, changes).await;
        store.state()
    });

    queue
        .enqueue(PendingOperation::insert("harvests", serde_json::json!({"kg": 12})))
        .unwrap();
    wait_for(&mut rx, SyncStatus::Pending).await;

    monitor.set_online(false);
    wait_for(&mut rx, SyncStatus::Offline).await;

    queue.clear().unwrap();
    monitor.set_online(true);
    wait_for(&mut rx, SyncStatus::Synced).await;

    drop(monitor);
    let final_state = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(final_state.status, SyncStatus::Synced);
}

#[tokio::test]
async fn run_reads_persisted_queue_before_any_change() {
    let backing = Arc::new(MemoryStore::new());
    {
        let earlier = OfflineQueue::new(backing.clone());
        earlier
            .enqueue(PendingOperation::insert("harvests", serde_json::json!({"kg": 4})))
            .unwrap();
    }

    let queue = Arc::new(OfflineQueue::new(backing));
    let monitor = NetworkMonitor::new(true);
    let mut store = SyncStatusStore::new(queue.clone(), monitor.is_online());
    let mut rx = store.subscribe();
    assert_eq!(store.status(), SyncStatus::Synced);

    let connectivity = monitor.subscribe();
    let changes = queue.changes();
    let task = tokio::spawn(async move { store.run(connectivity, changes).await });

    wait_for(&mut rx, SyncStatus::Pending).await;
    assert_eq!(rx.borrow().queue_length, 1);

    drop(monitor);
    task.await.unwrap();
}

#[tokio::test]
async fn run_shares_queue_changes_with_other_observers() {
    let queue = Arc::new(OfflineQueue::new(Arc::new(MemoryStore::new())));
    let monitor = NetworkMonitor::new(true);
    let mut store = SyncStatusStore::new(queue.clone(), true);
    let mut rx = store.subscribe();
    let mut other = queue.changes();

    let connectivity = monitor.subscribe();
    let changes = queue.changes();
    let task = tokio::spawn(async move { store.run(connectivity, changes).await });

    queue
        .enqueue(PendingOperation::insert("plots", serde_json::json!({})))
        .unwrap();
    wait_for(&mut rx, SyncStatus::Pending).await;
    tokio::time::timeout(Duration::from_secs(1), other.changed())
        .await
        .expect("second observer missed the change")
        .unwrap();

    drop(monitor);
    task.await.unwrap();
}

#[tokio::test]
async fn start_publishes_initial_state() {
    let queue = FakeQueue::with_len(2);
    let store = SyncStatusStore::start(queue.clone(), true).await;
    assert_eq!(store.status(), SyncStatus::Pending);
    assert_eq!(store.queue_length(), 2);
    assert_eq!(queue.reads(), 1);
    assert_eq!(store.subscribe().borrow().status, SyncStatus::Pending);
}

async fn wait_for(rx: &mut tokio::sync::watch::Receiver<SyncState>, status: SyncStatus) {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.status == status))
        .await
        .expect("status never reached")
        .expect("store dropped");
}

// ── Network monitor ──────────────────────────────────────────────

#[test]
fn monitor_reports_only_transitions() {
    let monitor = NetworkMonitor::new(true);
    let rx = monitor.subscribe();
    assert!(!monitor.set_online(true));
    assert!(!rx.has_changed().unwrap());

    assert!(monitor.set_online(false));
    assert!(!monitor.is_online());
    assert!(rx.has_changed().unwrap());
}

#[test]
fn monitor_defaults_online() {
    assert!(NetworkMonitor::default().is_online());
}
