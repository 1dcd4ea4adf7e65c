//! Session activity tracking for CollectPro.
//!
//! Keeps a persisted last-activity timestamp that every tracked user
//! interaction refreshes, and declares the session stale once the
//! inactivity window (48 hours by default) has elapsed. Also remembers the
//! last visited page so navigation can be restored after a reload.

pub mod config;
pub mod error;
pub mod interaction;
pub mod tracker;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use interaction::{InteractionHub, InteractionKind, ListenerId};
pub use tracker::{ActivityListeners, SessionTracker, TRACKED_INTERACTIONS};
