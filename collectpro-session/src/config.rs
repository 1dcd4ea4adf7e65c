//! Session tracking configuration.

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Inactivity window after which a session is considered stale.
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 48 * 60 * 60;

/// Page restored when no last page was remembered.
pub const DEFAULT_LAST_PAGE: &str = "/app/dashboard";

/// Configuration for the session tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum time between two recorded activities, in seconds.
    pub timeout_secs: i64,

    /// Path returned by `last_page()` when nothing was stored.
    pub default_page: String,

    /// Paths containing any of these fragments are never remembered.
    /// The root path is always excluded.
    pub excluded_fragments: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            default_page: DEFAULT_LAST_PAGE.to_string(),
            excluded_fragments: vec!["/login".to_string()],
        }
    }
}

impl SessionConfig {
    /// Returns the inactivity window as a chrono duration. A value outside
    /// chrono's range falls back to the default window.
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.timeout_secs)
            .filter(|_| self.timeout_secs > 0)
            .unwrap_or_else(|| {
                warn!(
                    "session timeout {}s out of range, using {DEFAULT_SESSION_TIMEOUT_SECS}s",
                    self.timeout_secs
                );
                chrono::Duration::seconds(DEFAULT_SESSION_TIMEOUT_SECS)
            })
    }

    /// Rejects values the tracker cannot work with.
    pub fn validate(&self) -> SessionResult<()> {
        if self.timeout_secs <= 0 || chrono::Duration::try_seconds(self.timeout_secs).is_none() {
            return Err(SessionError::Config(format!(
                "timeout_secs must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }
        if !self.default_page.starts_with('/') {
            return Err(SessionError::Config(format!(
                "default_page must be an absolute path, got {:?}",
                self.default_page
            )));
        }
        Ok(())
    }

    /// Returns true if `path` may be stored as the last page.
    pub fn is_rememberable(&self, path: &str) -> bool {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return false;
        }
        !self
            .excluded_fragments
            .iter()
            .any(|fragment| trimmed.contains(fragment.as_str()))
    }
}
