//! Global sign-out against the hosted auth admin API.

use crate::error::{AdminError, AdminResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Revokes every session of a user.
#[async_trait]
pub trait AuthAdmin: Send + Sync {
    async fn sign_out_everywhere(&self, user_id: &str) -> AdminResult<()>;
}

/// [`AuthAdmin`] backed by `POST /auth/v1/admin/users/{id}/logout?scope=global`,
/// authenticated with the service-role key.
#[derive(Clone)]
pub struct HttpAuthAdmin {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl HttpAuthAdmin {
    pub fn new(base_url: &str, service_role_key: &str) -> AdminResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }
}

#[async_trait]
impl AuthAdmin for HttpAuthAdmin {
    async fn sign_out_everywhere(&self, user_id: &str) -> AdminResult<()> {
        let url = format!(
            "{}/auth/v1/admin/users/{}/logout?scope=global",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("revoked all sessions of {user_id}");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                ["msg", "message", "error_description", "error"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| format!("auth admin returned HTTP {}", status.as_u16()));
        Err(AdminError::SignOutFailed(message))
    }
}
