//! Sync options and outcomes

use ckanny_api::InsertMethod;

use crate::datastore::TableOptions;
use crate::tabular::ParseOptions;
use crate::{Error, Result};

/// Default number of rows per `datastore_upsert` request
pub const DEFAULT_CHUNK_ROWS: usize = 1000;

/// Default read size when downloading and hashing
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 20;

/// Options for [`SyncEngine::sync`](super::SyncEngine::sync) and
/// [`SyncEngine::upload`](super::SyncEngine::upload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Replace the table even when the content hash is unchanged. Also sent
    /// as CKAN's `force` flag, so read-only tables can be replaced.
    pub force: bool,
    pub chunk_rows: usize,
    pub chunk_bytes: usize,
    /// With a key the table is kept and rows are upserted; without one the
    /// table is dropped and rebuilt.
    pub primary_key: Vec<String>,
    pub sanitize: bool,
    pub type_cast: bool,
    /// Overrides the encoding announced by the server
    pub encoding: Option<String>,
    pub first_row: usize,
    pub first_col: usize,
    pub indexes: Vec<String>,
    pub aliases: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            primary_key: Vec::new(),
            sanitize: false,
            type_cast: false,
            encoding: None,
            first_row: 0,
            first_col: 0,
            indexes: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl SyncOptions {
    /// Check the options before any remote call is made.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_rows == 0 {
            return Err(Error::invalid_option("chunk_rows must be greater than 0"));
        }
        if self.chunk_bytes == 0 {
            return Err(Error::invalid_option("chunk_bytes must be greater than 0"));
        }

        let lists = [
            ("primary_key", &self.primary_key),
            ("indexes", &self.indexes),
            ("aliases", &self.aliases),
        ];
        for (name, list) in lists {
            if list.iter().any(|item| item.trim().is_empty()) {
                return Err(Error::invalid_option(format!(
                    "{} contains an empty name",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            encoding: self.encoding.clone(),
            sanitize: self.sanitize,
            type_cast: self.type_cast,
            first_row: self.first_row,
            first_col: self.first_col,
        }
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            primary_key: self.primary_key.clone(),
            indexes: self.indexes.clone(),
            aliases: self.aliases.clone(),
        }
    }

    pub fn is_keyed(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn insert_method(&self) -> InsertMethod {
        if self.is_keyed() {
            InsertMethod::Upsert
        } else {
            InsertMethod::Insert
        }
    }
}

/// Split a comma separated list such as `"id,date"`, dropping blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Result of a successful sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The content hash matched the ledger; nothing was written
    Unchanged,
    /// The table was rewritten with `rows` rows
    Updated { rows: usize },
}

/// Whether a sync should write, given the old and new hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncDecision {
    pub changed: bool,
    pub force: bool,
}

impl SyncDecision {
    pub fn new(old_hash: Option<&str>, new_hash: &str, force: bool) -> Self {
        Self {
            changed: old_hash != Some(new_hash),
            force,
        }
    }

    pub fn should_apply(&self) -> bool {
        self.changed || self.force
    }

    pub fn message(&self) -> &'static str {
        match (self.changed, self.force) {
            (true, _) => "New data found. Updating datastore...",
            (false, true) => "No new data found, but update forced. Updating datastore...",
            (false, false) => "No new data found. Not updating datastore.",
        }
    }
}
