//! Connection settings shared by every command
//!
//! Command-line flags and environment variables (handled by clap) win over
//! the settings file.

use std::path::Path;

use ckanny_api::{CkanClient, ClientConfig, REMOTE_ENV};
use ckanny_core::{LedgerConfig, Settings, SyncOptions, parse_key_list};

use crate::cli::{Cli, LedgerArgs, LoadArgs};
use crate::error::{CliError, Result};

/// Resolved global options
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub settings: Settings,
    pub remote: Option<String>,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let settings = Settings::discover(cli.config.as_deref())?;
        Ok(Self::new(
            settings,
            cli.remote.clone(),
            cli.api_key.clone(),
            cli.user_agent.clone(),
        ))
    }

    pub fn new(
        settings: Settings,
        remote: Option<String>,
        api_key: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            remote: remote.or_else(|| settings.remote.clone()),
            api_key: api_key.or_else(|| settings.api_key.clone()),
            user_agent: user_agent.or_else(|| settings.user_agent.clone()),
            settings,
        }
    }

    /// A client for the configured remote
    pub fn client(&self) -> Result<CkanClient> {
        let remote = self.remote.as_deref().ok_or_else(|| {
            CliError::user(format!(
                "No remote ckan url given. Pass --remote or set {}.",
                REMOTE_ENV
            ))
        })?;
        self.client_for(remote)
    }

    /// A client for `remote`, with the configured key and user agent
    pub fn client_for(&self, remote: &str) -> Result<CkanClient> {
        let config = ClientConfig::new(remote)
            .with_api_key(self.api_key.clone())
            .with_user_agent(self.user_agent.clone());
        Ok(CkanClient::new(config)?)
    }

    pub fn ledger_config(&self, args: &LedgerArgs) -> LedgerConfig {
        let mut config = self.settings.ledger_config();
        if let Some(package) = &args.hash_table {
            config.package = package.clone();
        }
        if let Some(group) = &args.hash_group {
            config.owner_group = group.clone();
        }
        config
    }

    pub fn chunk_bytes(&self, flag: Option<usize>) -> usize {
        flag.or(self.settings.chunk_bytes)
            .unwrap_or(ckanny_core::sync::DEFAULT_CHUNK_BYTES)
    }

    /// Sync options from the load flags, falling back to the settings file
    /// for chunk sizes.
    pub fn sync_options(&self, load: &LoadArgs, chunk_bytes: Option<usize>) -> SyncOptions {
        SyncOptions {
            force: load.force,
            chunk_rows: load
                .chunksize_rows
                .or(self.settings.chunk_rows)
                .unwrap_or(ckanny_core::sync::DEFAULT_CHUNK_ROWS),
            chunk_bytes: self.chunk_bytes(chunk_bytes),
            primary_key: load.primary_key.as_deref().map(parse_key_list).unwrap_or_default(),
            sanitize: load.sanitize,
            type_cast: load.type_cast,
            encoding: load.encoding.clone(),
            first_row: load.first_row,
            first_col: load.first_col,
            indexes: load.indexes.as_deref().map(parse_key_list).unwrap_or_default(),
            aliases: load.aliases.as_deref().map(parse_key_list).unwrap_or_default(),
        }
    }
}

/// Resource id for `ds upload` / `fs upload` when none was given
pub fn default_resource_id(source: &Path) -> Result<String> {
    ckanny_core::sync::resource_id_from_path(source).ok_or_else(|| {
        CliError::user(format!(
            "Cannot derive a resource id from `{}`. Pass --resource-id.",
            source.display()
        ))
    })
}
