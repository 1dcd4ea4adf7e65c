//! HTTP client for the hosted backend.
//!
//! Wraps the auth endpoints (`/auth/v1`) and row access (`/rest/v1`).
//! Every request carries the `apikey` header and a bearer token: the
//! session's access token when signed in, the anonymous key otherwise.
//! With auto-refresh enabled the token is refreshed shortly before it
//! expires and once more on a 401.

use crate::config::BackendConfig;
use crate::drain::RemoteStore;
use crate::error::{SyncError, SyncResult};
use crate::queue::{OperationKind, PendingOperation};
use crate::types::{AuthSession, TokenResponse, expiry_after_secs};
use async_trait::async_trait;
use collectpro_store::{AUTH_SESSION_KEY, LocalStore};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Session state shared across clones.
#[derive(Default)]
struct AuthState {
    session: Option<AuthSession>,
    /// Bumped on every successful refresh so a waiter can tell that a
    /// concurrent refresh already replaced the tokens.
    refresh_generation: u64,
}

/// Authenticated client for the hosted backend.
pub struct BackendClient<S: LocalStore> {
    client: Client,
    config: BackendConfig,
    store: Arc<S>,
    auth: Arc<RwLock<AuthState>>,
    /// Serializes refreshes; the auth service rotates refresh tokens, so
    /// two concurrent refreshes with the same token would fail.
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<S: LocalStore> Clone for BackendClient<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            auth: Arc::clone(&self.auth),
            refresh_lock: Arc::clone(&self.refresh_lock),
        }
    }
}

impl<S: LocalStore> BackendClient<S> {
    pub fn new(config: BackendConfig, store: Arc<S>) -> SyncResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            store,
            auth: Arc::new(RwLock::new(AuthState::default())),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    // ── Session ──

    /// Loads a persisted session into memory, if session persistence is on.
    pub async fn restore_session(&self) -> SyncResult<Option<AuthSession>> {
        if !self.config.persist_session {
            return Ok(None);
        }
        let session: Option<AuthSession> = self.store.load_json(AUTH_SESSION_KEY)?;
        if let Some(session) = &session {
            debug!("restored persisted session for {:?}", session.user_id());
        }
        self.auth.write().await.session = session.clone();
        Ok(session)
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.auth.read().await.session.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.session.is_some()
    }

    async fn install_session(&self, session: AuthSession) -> SyncResult<()> {
        if self.config.persist_session {
            self.store.save_json(AUTH_SESSION_KEY, &session)?;
        }
        let mut auth = self.auth.write().await;
        auth.session = Some(session);
        auth.refresh_generation += 1;
        Ok(())
    }

    async fn drop_session(&self) -> SyncResult<()> {
        self.auth.write().await.session = None;
        if self.config.persist_session {
            self.store.remove_item(AUTH_SESSION_KEY)?;
        }
        Ok(())
    }

    // ── Auth ──

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> SyncResult<AuthSession> {
        let url = self.url("/auth/v1/token?grant_type=password");
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = error_from_response(resp).await;
            return Err(SyncError::AuthFailed(err.to_string()));
        }

        let session: AuthSession = resp.json::<TokenResponse>().await?.into();
        info!("signed in as {:?}", session.user_id());
        self.install_session(session.clone()).await?;
        Ok(session)
    }

    /// Exchanges the refresh token for a new session. A rejected refresh
    /// token clears the stored session.
    pub async fn refresh_session(&self) -> SyncResult<AuthSession> {
        let pre_gen = self.auth.read().await.refresh_generation;
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = {
            let auth = self.auth.read().await;
            if auth.refresh_generation > pre_gen {
                return auth.session.clone().ok_or(SyncError::AuthRequired);
            }
            auth.session
                .as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or(SyncError::AuthRequired)?
        };

        let url = self.url("/auth/v1/token?grant_type=refresh_token");
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::BAD_REQUEST
        {
            warn!("refresh token rejected ({status}), clearing session");
            self.drop_session().await?;
            return Err(SyncError::AuthFailed(
                "session expired, sign in again".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(error_from_response(resp).await);
        }

        let mut session: AuthSession = resp.json::<TokenResponse>().await?.into();
        if session.user.is_none() {
            session.user = self.session().await.and_then(|s| s.user);
        }
        debug!("refreshed session for {:?}", session.user_id());
        self.install_session(session.clone()).await?;
        Ok(session)
    }

    /// Ends the session locally. The server-side logout is best effort.
    pub async fn sign_out(&self) -> SyncResult<()> {
        if let Some(session) = self.session().await {
            let result = self
                .client
                .post(self.url("/auth/v1/logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            if let Err(e) = result {
                warn!("server logout failed, clearing local session anyway: {e}");
            }
        }
        self.drop_session().await
    }

    /// Installs a session handed over in a redirect URL (fragment or query
    /// carrying `access_token` and `refresh_token`). Returns `None` when
    /// detection is disabled or the URL carries no session.
    pub async fn session_from_url(&self, url: &str) -> SyncResult<Option<AuthSession>> {
        if !self.config.detect_session_in_url {
            return Ok(None);
        }
        let Some(session) = parse_session_url(url)? else {
            return Ok(None);
        };
        info!("session detected in redirect URL");
        self.install_session(session.clone()).await?;
        Ok(Some(session))
    }

    async fn bearer(&self) -> SyncResult<String> {
        let session = self.session().await;
        match session {
            Some(s) if self.config.auto_refresh_token
                && s.expires_within_secs(self.config.refresh_margin_secs) =>
            {
                debug!("access token close to expiry, refreshing");
                Ok(self.refresh_session().await?.access_token)
            }
            Some(s) => Ok(s.access_token),
            None => Ok(self.config.anon_key.clone()),
        }
    }

    // ── Requests ──

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn request(&self, method: Method, path: &str, token: &str, body: Option<&Value>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token);
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Sends a request, refreshing and retrying once on 401.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> SyncResult<Response> {
        let token = self.bearer().await?;
        let resp = self.request(method.clone(), path, &token, body).send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED
            && self.config.auto_refresh_token
            && self.is_authenticated().await
        {
            debug!("401 on {method} {path}, refreshing token");
            let session = self.refresh_session().await?;
            let resp = self
                .request(method, path, &session.access_token, body)
                .send()
                .await?;
            return check(resp).await;
        }

        check(resp).await
    }

    // ── Rows ──

    /// `GET /rest/v1/{table}?{query}`.
    pub async fn select(&self, table: &str, query: &str) -> SyncResult<Vec<Value>> {
        let path = with_query(&format!("/rest/v1/{table}"), query);
        Ok(self.send(Method::GET, &path, None).await?.json().await?)
    }

    pub async fn insert(&self, table: &str, row: &Value) -> SyncResult<Vec<Value>> {
        let resp = self
            .send(Method::POST, &format!("/rest/v1/{table}"), Some(row))
            .await?;
        json_rows(resp).await
    }

    pub async fn update(&self, table: &str, filter: &str, patch: &Value) -> SyncResult<Vec<Value>> {
        let path = with_query(&format!("/rest/v1/{table}"), filter);
        let resp = self.send(Method::PATCH, &path, Some(patch)).await?;
        json_rows(resp).await
    }

    pub async fn delete(&self, table: &str, filter: &str) -> SyncResult<()> {
        if filter.trim().is_empty() {
            return Err(SyncError::InvalidOperation(format!(
                "refusing unfiltered delete on {table}"
            )));
        }
        let path = with_query(&format!("/rest/v1/{table}"), filter);
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Calls a remote database function.
    pub async fn rpc(&self, function: &str, args: &Value) -> SyncResult<Value> {
        let resp = self
            .send(Method::POST, &format!("/rest/v1/rpc/{function}"), Some(args))
            .await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl<S: LocalStore> RemoteStore for BackendClient<S> {
    async fn apply(&self, op: &PendingOperation) -> SyncResult<()> {
        match op.kind {
            OperationKind::Insert => {
                self.insert(&op.table, &op.payload).await?;
            }
            OperationKind::Update => {
                self.update(&op.table, op.required_filter()?, &op.payload).await?;
            }
            OperationKind::Delete => {
                self.delete(&op.table, op.required_filter()?).await?;
            }
            OperationKind::Rpc => {
                self.rpc(&op.table, &op.payload).await?;
            }
        }
        Ok(())
    }
}

fn with_query(path: &str, query: &str) -> String {
    let query = query.trim().trim_start_matches('?');
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

async fn check(resp: Response) -> SyncResult<Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(error_from_response(resp).await)
    }
}

async fn json_rows(resp: Response) -> SyncResult<Vec<Value>> {
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rows) => Ok(rows),
        other => Ok(vec![other]),
    }
}

/// Builds a `Backend` error from a failed response, pulling the message out
/// of the usual JSON error shapes when present.
async fn error_from_response(resp: Response) -> SyncError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| if body.is_empty() { format!("HTTP {status}") } else { body });
    SyncError::Backend { status, message }
}

/// Extracts a session from a redirect URL's fragment (or query string).
pub fn parse_session_url(url: &str) -> SyncResult<Option<AuthSession>> {
    let params = match url.split_once('#') {
        Some((_, fragment)) => fragment,
        None => match url.split_once('?') {
            Some((_, query)) => query,
            None => return Ok(None),
        },
    };

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut error = None;

    for pair in params.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "access_token" => access_token = Some(value),
            "refresh_token" => refresh_token = Some(value),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            "error_description" => error = Some(value),
            "error" if error.is_none() => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(SyncError::AuthFailed(error));
    }

    match (access_token, refresh_token) {
        (Some(access_token), Some(refresh_token)) => Ok(Some(AuthSession {
            access_token,
            refresh_token,
            expires_at: expires_in.and_then(expiry_after_secs),
            user: None,
        })),
        _ => Ok(None),
    }
}
