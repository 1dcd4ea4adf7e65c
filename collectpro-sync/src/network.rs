//! Connectivity tracking.
//!
//! The shell reports online/offline transitions; subscribers receive the
//! flag through a `watch` channel. Repeating the current state is not a
//! transition and wakes nobody.

use tokio::sync::watch;
use tracing::{info, warn};

/// Owns the current connectivity flag.
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Creates a monitor seeded with the platform's current flag.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records the connectivity flag. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });

        if changed {
            if online {
                info!("network: online");
            } else {
                warn!("network: offline");
            }
        }
        changed
    }

    /// Returns a receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
