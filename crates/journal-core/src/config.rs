//! Client configuration: JSON file, environment overrides, validation.

use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JournalError, Result};
use crate::transport::{default_user_agent, Auth, TransportConfig, DEFAULT_TIMEOUT_SECS};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "journal";
pub const APP_NAME: &str = "journal-sync";

pub const SERVER_URL_ENV: &str = "JOURNAL_SERVER_URL";
pub const AUTH_TOKEN_ENV: &str = "JOURNAL_AUTH_TOKEN";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
            .ok_or_else(|| JournalError::Config("cannot determine config directory".into()))?;
        Ok(dirs.config_dir().join("config.json"))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| JournalError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| JournalError::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn apply_env(self) -> Self {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|v| !v.is_empty()) {
            self.server_url = url;
        }
        if let Some(token) = lookup(AUTH_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.auth_token = Some(token);
        }
        self
    }

    /// Parsed server base URL; only http and https with a host are accepted.
    pub fn validate(&self) -> Result<Url> {
        if self.server_url.is_empty() {
            return Err(JournalError::Config(format!(
                "server URL not set (config file or {SERVER_URL_ENV})"
            )));
        }
        let url = Url::parse(&self.server_url)
            .map_err(|e| JournalError::InvalidUrl(format!("{}: {e}", self.server_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(JournalError::InvalidUrl(format!(
                "{}: URL must be http or https",
                self.server_url
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(JournalError::InvalidUrl(format!(
                "{}: host name required",
                self.server_url
            )));
        }
        Ok(url)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            auth: self.auth_token.clone().map(Auth::Token),
        }
    }
}
