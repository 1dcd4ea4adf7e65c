//! Environment-driven configuration.
//!
//! Values come from a lookup function (the process environment in
//! production). The service-role key may instead be mounted as a secret
//! file under `/run/secrets`.

use crate::error::{AdminError, AdminResult};
use std::{
    env,
    fs::read_to_string,
    path::Path,
};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8787;
pub const SECRETS_DIR: &str = "/run/secrets";

const PORT_VAR: &str = "ADMIN_PORT";
const BACKEND_URL_VAR: &str = "BACKEND_URL";
const SERVICE_KEY_VAR: &str = "BACKEND_SERVICE_ROLE_KEY";
const ORIGINS_VAR: &str = "CORS_ALLOWED_ORIGINS";
const CREDENTIALS_VAR: &str = "CORS_ALLOW_CREDENTIALS";

/// Origins allowed to call the function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parses `*` or a comma-separated origin list.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|o| o.trim().trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: AllowedOrigins,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::Any,
            allow_credentials: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub port: u16,
    pub backend_url: String,
    pub service_role_key: String,
    pub cors: CorsConfig,
}

impl AdminConfig {
    pub fn from_env() -> AdminResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AdminResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_sources(lookup, Path::new(SECRETS_DIR))
    }

    /// Reads every value through `lookup`, falling back to `secrets_dir`
    /// for the service-role key.
    pub fn from_sources<F>(lookup: F, secrets_dir: &Path) -> AdminResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var(PORT_VAR) {
            Some(raw) => raw
                .parse()
                .map_err(|e| AdminError::Config(format!("invalid {PORT_VAR} {raw:?}: {e}")))?,
            None => {
                info!("{PORT_VAR} not set, using default: {DEFAULT_PORT}");
                DEFAULT_PORT
            }
        };

        let backend_url = var(BACKEND_URL_VAR)
            .ok_or_else(|| AdminError::Config(format!("{BACKEND_URL_VAR} is required")))?;
        if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
            return Err(AdminError::Config(format!(
                "{BACKEND_URL_VAR} must be http(s), got {backend_url:?}"
            )));
        }

        let service_role_key = match var(SERVICE_KEY_VAR) {
            Some(key) => key,
            None => read_secret(&secrets_dir.join(SERVICE_KEY_VAR))?,
        };

        let allowed_origins = var(ORIGINS_VAR)
            .map(|raw| AllowedOrigins::parse(&raw))
            .unwrap_or(AllowedOrigins::Any);

        let allow_credentials = match var(CREDENTIALS_VAR) {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| AdminError::Config(format!("invalid {CREDENTIALS_VAR} {raw:?}")))?,
            None => true,
        };

        Ok(Self {
            port,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            service_role_key,
            cors: CorsConfig {
                allowed_origins,
                allow_credentials,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn read_secret(path: &Path) -> AdminResult<String> {
    let secret = read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("failed to read secret {}: {e}", path.display());
            AdminError::Config(format!("{SERVICE_KEY_VAR} is required"))
        })?;
    if secret.is_empty() {
        return Err(AdminError::Config(format!("{} is empty", path.display())));
    }
    Ok(secret)
}
