//! SyncEngine implementation
//!
//! The SyncEngine fills a resource's datastore table from its file and
//! keeps the hash ledger in step with what was actually written.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ckanny_api::{Catalog, ContentFetcher, Fetched};
use tracing::{info, warn};

use super::options::{SyncDecision, SyncOptions, SyncOutcome};
use crate::config::LedgerConfig;
use crate::datastore::Datastore;
use crate::error::SyncStep;
use crate::ledger::HashLedger;
use crate::spool::spool;
use crate::tabular::{self, ParsedTable, TabularFormat};
use crate::{Error, Result};

/// Engine for synchronizing files into the datastore
///
/// - **sync**: fetch, hash, compare with the ledger and rebuild the table
///   only when the content changed (or when forced)
/// - **upload**: rebuild a table from a local file, without the ledger
pub struct SyncEngine<'a> {
    catalog: &'a dyn Catalog,
    ledger: HashLedger<'a>,
}

impl<'a> SyncEngine<'a> {
    /// Create a SyncEngine whose ledger lives where `ledger` says.
    pub fn new(catalog: &'a dyn Catalog, ledger: LedgerConfig) -> Self {
        Self {
            catalog,
            ledger: HashLedger::open(catalog, ledger),
        }
    }

    pub fn ledger(&self) -> &HashLedger<'a> {
        &self.ledger
    }

    /// Sync the table of `resource_id` with the file `source` serves for it.
    ///
    /// The ledger is only written after every row was accepted, so after a
    /// failed sync it still holds the previous hash.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOption` for bad options, otherwise an
    /// `Error::Sync` naming the step that failed.
    pub fn sync(
        &self,
        resource_id: &str,
        source: &dyn ContentFetcher,
        options: &SyncOptions,
    ) -> Result<SyncOutcome> {
        options.validate()?;
        let step = |step: SyncStep| move |e: Error| e.during(resource_id, step);

        let Fetched {
            mut body,
            content_type,
            encoding,
            content_length,
            file_name,
        } = source
            .fetch(resource_id)
            .map_err(Error::from)
            .map_err(step(SyncStep::Fetch))?;

        let mut spooled = spool(&mut body, options.chunk_bytes, content_length)
            .map_err(step(SyncStep::Spool))?;
        let new_hash = spooled
            .checksum(options.chunk_bytes)
            .map_err(step(SyncStep::Hash))?;

        let old_hash = self
            .lookup_hash(resource_id)
            .map_err(step(SyncStep::Ledger))?;

        let decision = SyncDecision::new(old_hash.as_deref(), &new_hash, options.force);
        info!("{}", decision.message());
        if !decision.should_apply() {
            return Ok(SyncOutcome::Unchanged);
        }

        let mut parse_options = options.parse_options();
        if parse_options.encoding.is_none() {
            parse_options.encoding = encoding;
        }
        let table = TabularFormat::detect(content_type.as_deref(), file_name.as_deref())
            .and_then(|format| {
                let reader = spooled.reader()?;
                tabular::parse(reader, format, &parse_options)
            })
            .map_err(step(SyncStep::Parse))?;

        let rows = self.apply(resource_id, table, options)?;

        self.ledger
            .set_hash(resource_id, &new_hash)
            .map_err(step(SyncStep::RecordHash))?;
        info!(resource_id, rows, "Datastore updated");
        Ok(SyncOutcome::Updated { rows })
    }

    /// Rebuild the table of `resource_id` from a local file. The format
    /// comes from the file extension; the ledger is not consulted.
    ///
    /// Returns the number of rows written.
    pub fn upload(&self, resource_id: &str, path: &Path, options: &SyncOptions) -> Result<usize> {
        options.validate()?;
        let step = |step: SyncStep| move |e: Error| e.during(resource_id, step);

        let table = TabularFormat::detect(None, path.to_str())
            .and_then(|format| {
                let reader = BufReader::new(File::open(path)?);
                tabular::parse(reader, format, &options.parse_options())
            })
            .map_err(step(SyncStep::Parse))?;

        self.apply(resource_id, table, options)
    }

    /// The ledger hash of `resource_id`, bootstrapping the ledger once if
    /// any part of it is missing.
    fn lookup_hash(&self, resource_id: &str) -> Result<Option<String>> {
        match self.ledger.get_hash(resource_id) {
            Err(Error::NotFound { item, message }) => {
                warn!(%item, "{} Bootstrapping hash table.", message);
                self.ledger.bootstrap()?;
                self.ledger.get_hash(resource_id)
            }
            result => result,
        }
    }

    /// Replace the table contents. Without a primary key the old table is
    /// dropped first; with one, rows are upserted into the existing table.
    fn apply(&self, resource_id: &str, table: ParsedTable, options: &SyncOptions) -> Result<usize> {
        let step = |step: SyncStep| move |e: Error| e.during(resource_id, step);
        let datastore = Datastore::new(self.catalog).with_force(options.force);

        if !options.is_keyed() {
            datastore
                .delete_table(resource_id, None)
                .map_err(step(SyncStep::Delete))?;
        }

        datastore
            .create_table(resource_id, &table.fields, &options.table_options())
            .map_err(step(SyncStep::Create))?;

        datastore
            .insert_records(
                resource_id,
                table.records,
                options.insert_method(),
                options.chunk_rows,
            )
            .map_err(step(SyncStep::Insert))
    }
}

/// The resource id implied by a file name: everything before the first `.`
pub fn resource_id_from_path(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn resource_id_from_file_name() {
        assert_eq!(
            resource_id_from_path(&PathBuf::from("/data/abc-123.csv")),
            Some("abc-123".to_string())
        );
        assert_eq!(
            resource_id_from_path(&PathBuf::from("abc.tar.gz")),
            Some("abc".to_string())
        );
        assert_eq!(resource_id_from_path(&PathBuf::from(".hidden")), None);
    }
}
