//! Configuration for the ledger and the settings file
//!
//! The settings file is optional TOML:
//!
//! ```toml
//! remote = "https://data.example.org"
//! api_key = "..."
//! hash_table = "hash-table"
//! hash_group = "HDX"
//! chunk_rows = 1000
//! ```
//!
//! Command-line flags and environment variables take precedence over it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Default name of the package holding the hash ledger
pub const DEFAULT_HASH_PACKAGE: &str = "hash-table";

/// Default name of the ledger's CSV resource
pub const DEFAULT_HASH_RESOURCE: &str = "hash-table.csv";

/// Default display name of the organization that owns the ledger
pub const DEFAULT_HASH_GROUP: &str = "HDX";

/// Where the hash ledger lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Name of the package holding the ledger table
    pub package: String,
    /// Name given to the ledger resource when it is created
    pub resource_name: String,
    /// Display name of the organization a new ledger package belongs to
    pub owner_group: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            package: DEFAULT_HASH_PACKAGE.to_string(),
            resource_name: DEFAULT_HASH_RESOURCE.to_string(),
            owner_group: DEFAULT_HASH_GROUP.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_owner_group(mut self, owner_group: impl Into<String>) -> Self {
        self.owner_group = owner_group.into();
        self
    }
}

/// Contents of the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub remote: Option<String>,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
    /// Ledger package name
    pub hash_table: Option<String>,
    /// Ledger owner organization display name
    pub hash_group: Option<String>,
    pub chunk_rows: Option<usize>,
    pub chunk_bytes: Option<usize>,
}

impl Settings {
    /// `$XDG_CONFIG_HOME/ckanny/config.toml` (or the platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ckanny").join("config.toml"))
    }

    /// Read settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Settings` if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings = toml::from_str(&content).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// empty settings.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Ledger location with settings applied over the defaults
    pub fn ledger_config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::default();
        if let Some(package) = &self.hash_table {
            config.package = package.clone();
        }
        if let Some(group) = &self.hash_group {
            config.owner_group = group.clone();
        }
        config
    }
}
