//! Client configuration

use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// Environment variable holding the remote catalog URL
pub const REMOTE_ENV: &str = "CKAN_REMOTE_URL";
/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "CKAN_API_KEY";
/// Environment variable holding the user agent
pub const USER_AGENT_ENV: &str = "CKAN_USER_AGENT";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// User agent sent when none is configured
pub fn default_user_agent() -> String {
    format!("ckanny/{}", env!("CARGO_PKG_VERSION"))
}

/// Connection settings for a single CKAN instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the catalog, e.g. `https://data.example.org`
    pub remote: String,
    pub api_key: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            api_key: None,
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.is_empty());
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        if let Some(user_agent) = user_agent.filter(|ua| !ua.is_empty()) {
            self.user_agent = user_agent;
        }
        self
    }

    /// Parse and check the remote URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the remote is empty or not an http(s) URL.
    pub fn validate(&self) -> Result<Url> {
        if self.remote.trim().is_empty() {
            return Err(Error::Config {
                message: format!("no remote given (set `{}` or pass --remote)", REMOTE_ENV),
            });
        }

        let url = Url::parse(self.remote.trim()).map_err(|e| Error::Config {
            message: format!("invalid remote `{}`: {}", self.remote, e),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(Error::Config {
                message: format!("unsupported scheme `{}` in remote `{}`", scheme, self.remote),
            }),
        }
    }
}
