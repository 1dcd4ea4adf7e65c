//! Session activity tracker.
//!
//! The last-activity marker is stored as epoch milliseconds under
//! [`LAST_ACTIVE_KEY`]. Clock reads are plain wall-clock reads; the tracker
//! is a UX guard and makes no attempt to detect clock manipulation.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::interaction::{InteractionHub, InteractionKind, ListenerId};
use chrono::{DateTime, Utc};
use collectpro_store::{LAST_ACTIVE_KEY, LAST_PAGE_KEY, LocalStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Interactions that count as user activity.
pub const TRACKED_INTERACTIONS: [InteractionKind; 4] = [
    InteractionKind::PointerDown,
    InteractionKind::KeyDown,
    InteractionKind::TouchStart,
    InteractionKind::Scroll,
];

/// Tracks user activity and the last visited page in local storage.
pub struct SessionTracker<S: LocalStore> {
    store: Arc<S>,
    config: SessionConfig,
}

impl<S: LocalStore> Clone for SessionTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: LocalStore> SessionTracker<S> {
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stores the current time as the last activity.
    pub fn record_activity(&self) -> SessionResult<()> {
        self.record_activity_at(Utc::now())
    }

    /// Stores `at` as the last activity.
    pub fn record_activity_at(&self, at: DateTime<Utc>) -> SessionResult<()> {
        self.store
            .set_item(LAST_ACTIVE_KEY, &at.timestamp_millis().to_string())?;
        Ok(())
    }

    /// Returns the stored last-activity time, if any.
    pub fn last_activity(&self) -> SessionResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get_item(LAST_ACTIVE_KEY)? else {
            return Ok(None);
        };
        let millis: i64 = raw
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidTimestamp(raw.clone()))?;
        DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or(SessionError::InvalidTimestamp(raw))
    }

    /// Returns true if the last activity is within the inactivity window.
    pub fn is_session_valid(&self) -> bool {
        self.is_session_valid_at(Utc::now())
    }

    /// Same as [`is_session_valid`](Self::is_session_valid), evaluated at `now`.
    ///
    /// A missing or unreadable marker counts as an invalid session.
    pub fn is_session_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity() {
            Ok(Some(last)) => now - last <= self.config.timeout(),
            Ok(None) => false,
            Err(e) => {
                warn!("treating session as expired: {e}");
                false
            }
        }
    }

    /// Registers listeners on `hub` that record activity for every tracked
    /// interaction. Drop or [`detach`](ActivityListeners::detach) the
    /// returned value to remove them.
    pub fn attach_activity_listeners(&self, hub: &InteractionHub) -> ActivityListeners
    where
        S: 'static,
    {
        let ids = TRACKED_INTERACTIONS
            .iter()
            .map(|&kind| {
                let tracker = self.clone();
                hub.subscribe(kind, move |event| {
                    if let Err(e) = tracker.record_activity() {
                        warn!("failed to record {event} activity: {e}");
                    }
                })
            })
            .collect();

        debug!("attached {} activity listeners", TRACKED_INTERACTIONS.len());
        ActivityListeners {
            hub: hub.clone(),
            ids,
        }
    }

    /// Stores `path` as the last visited page unless it is the root or a
    /// login route. Returns whether the path was stored.
    pub fn remember_page(&self, path: &str) -> SessionResult<bool> {
        if !self.config.is_rememberable(path) {
            debug!("not remembering excluded path {path}");
            return Ok(false);
        }
        self.store.set_item(LAST_PAGE_KEY, path.trim())?;
        Ok(true)
    }

    /// Returns the remembered page, or the configured default.
    pub fn last_page(&self) -> String {
        match self.store.get_item(LAST_PAGE_KEY) {
            Ok(Some(path)) if !path.is_empty() => path,
            Ok(_) => self.config.default_page.clone(),
            Err(e) => {
                warn!("failed to read last page: {e}");
                self.config.default_page.clone()
            }
        }
    }

    /// Removes the activity marker and the remembered page.
    pub fn clear(&self) -> SessionResult<()> {
        self.store.remove_item(LAST_ACTIVE_KEY)?;
        self.store.remove_item(LAST_PAGE_KEY)?;
        Ok(())
    }
}

/// Disposer for listeners registered by
/// [`SessionTracker::attach_activity_listeners`].
#[must_use = "dropping the listeners detaches them immediately"]
pub struct ActivityListeners {
    hub: InteractionHub,
    ids: Vec<ListenerId>,
}

impl ActivityListeners {
    /// Number of listeners still attached.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Removes every listener. Consumes the disposer so it runs once.
    pub fn detach(mut self) {
        self.remove_all();
    }

    fn remove_all(&mut self) {
        for id in self.ids.drain(..) {
            self.hub.unsubscribe(id);
        }
    }
}

impl Drop for ActivityListeners {
    fn drop(&mut self) {
        self.remove_all();
    }
}
