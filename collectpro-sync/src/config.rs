//! Backend client configuration.

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryOptions;
use serde::{Deserialize, Serialize};

/// Configuration for [`BackendClient`](crate::BackendClient).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (e.g., "https://xyz.backend.example").
    pub url: String,

    /// Public (anonymous) API key sent with every request.
    pub anon_key: String,

    /// Refresh the access token before it expires and on 401.
    pub auto_refresh_token: bool,

    /// Keep the auth session in local storage across restarts.
    pub persist_session: bool,

    /// Accept sessions handed over in a redirect URL.
    pub detect_session_in_url: bool,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Refresh this many seconds before the access token expires.
    pub refresh_margin_secs: i64,

    /// Backoff used when draining the offline queue.
    pub retry: RetryOptions,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            auto_refresh_token: true,
            persist_session: true,
            detect_session_in_url: true,
            request_timeout_secs: 30,
            refresh_margin_secs: 60,
            retry: RetryOptions::default(),
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }

    /// Checks the fields the client cannot work without.
    pub fn validate(&self) -> SyncResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "backend url must be http(s), got {:?}",
                self.url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config("request_timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
