//! Shared types for backend sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the auth service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated backend session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// Converts a relative `expires_in` into an absolute instant. Values that do
/// not fit chrono's range yield `None`, i.e. no known expiry.
pub fn expiry_after_secs(secs: i64) -> Option<DateTime<Utc>> {
    chrono::Duration::try_seconds(secs).and_then(|delta| Utc::now().checked_add_signed(delta))
}

impl AuthSession {
    /// Returns true if the access token expires within `secs` seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        let Some(at) = self.expires_at else {
            return false;
        };
        match expiry_after_secs(secs) {
            Some(horizon) => horizon >= at,
            // a horizon past the representable range covers every expiry
            None => secs > 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl From<TokenResponse> for AuthSession {
    fn from(resp: TokenResponse) -> Self {
        Self {
            expires_at: resp.expires_in.and_then(expiry_after_secs),
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            user: resp.user,
        }
    }
}
