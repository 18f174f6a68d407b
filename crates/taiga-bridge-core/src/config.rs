//! Bridge configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::ProjectSelector;
use crate::{BridgeError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Environment variable overriding the API root
pub const ENV_URL: &str = "TAIGA_BRIDGE_URL";
/// Environment variable carrying the bearer token
pub const ENV_TOKEN: &str = "TAIGA_BRIDGE_TOKEN";
/// Environment variable selecting the project (id or slug)
pub const ENV_PROJECT: &str = "TAIGA_BRIDGE_PROJECT";
/// Environment variable overriding the request timeout
pub const ENV_TIMEOUT: &str = "TAIGA_BRIDGE_TIMEOUT_SECS";

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// API root, e.g. `https://api.taiga.io/api/v1`
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Project the facade binds to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSelector>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent header
    pub user_agent: String,

    /// Ask the backend for unpaginated listings
    pub disable_pagination: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            project: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("taiga-bridge/{}", crate::VERSION),
            disable_pagination: true,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the active project
    pub fn with_project(mut self, project: impl Into<ProjectSelector>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn from_env(self) -> crate::Result<Self> {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay<F>(mut self, lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            self = self.with_base_url(url.trim());
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.auth_token = Some(token.trim().to_string());
        }
        if let Some(project) = lookup(ENV_PROJECT).filter(|v| !v.trim().is_empty()) {
            self.project = Some(ProjectSelector::from(project.as_str()));
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            self.timeout_secs = timeout.trim().parse().map_err(|_| {
                BridgeError::Config(format!("{} must be a number of seconds", ENV_TIMEOUT))
            })?;
        }
        Ok(self)
    }

    /// Reject settings the transport cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| BridgeError::Config(format!("base_url {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BridgeError::Config(format!(
                "base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(BridgeError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
