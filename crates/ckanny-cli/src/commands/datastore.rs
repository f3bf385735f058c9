//! Datastore command implementations

use std::path::Path;

use colored::Colorize;
use serde_json::{Map, Value};

use ckanny_api::{Catalog, ContentFetcher};
use ckanny_core::{Datastore, HashLedger, LedgerConfig, SyncEngine, SyncOptions, SyncOutcome};

use crate::context::default_resource_id;
use crate::error::{CliError, Result};

/// Run `ds update`
///
/// Loads the table of `resource_id` from its filestore file when the file
/// content changed since the last update (or `force` is set).
pub fn run_update<C>(
    client: &C,
    resource_id: &str,
    options: &SyncOptions,
    ledger: LedgerConfig,
) -> Result<SyncOutcome>
where
    C: Catalog + ContentFetcher,
{
    let engine = SyncEngine::new(client, ledger);
    let outcome = engine.sync(resource_id, client, options)?;

    match outcome {
        SyncOutcome::Updated { rows } => {
            println!(
                "{} Resource {} updated ({} rows).",
                "Success!".green().bold(),
                resource_id.cyan(),
                rows
            );
        }
        SyncOutcome::Unchanged => {
            println!(
                "{} Resource {} is up to date.",
                "OK".green().bold(),
                resource_id.cyan()
            );
        }
    }
    Ok(outcome)
}

/// Run `ds upload`
///
/// Rebuilds the table from a local file. The hash table is left alone.
pub fn run_upload(
    catalog: &dyn Catalog,
    source: &Path,
    resource_id: Option<&str>,
    options: &SyncOptions,
) -> Result<usize> {
    let resource_id = match resource_id {
        Some(id) => id.to_string(),
        None => default_resource_id(source)?,
    };

    let engine = SyncEngine::new(catalog, LedgerConfig::default());
    let rows = engine.upload(&resource_id, source, options)?;
    println!(
        "{} Uploaded {} rows from {} to {}.",
        "Success!".green().bold(),
        rows,
        source.display(),
        resource_id.cyan()
    );
    Ok(rows)
}

/// Run `ds delete`
///
/// `filters` is a JSON object; without it the whole table is dropped.
pub fn run_delete(
    catalog: &dyn Catalog,
    resource_id: &str,
    filters: Option<&str>,
    force: bool,
) -> Result<bool> {
    let filters = filters.map(parse_filters).transpose()?;
    let deleted = Datastore::new(catalog)
        .with_force(force)
        .delete_table(resource_id, filters)?;

    if deleted {
        println!(
            "{} Deleted datastore table {}.",
            "Success!".green().bold(),
            resource_id.cyan()
        );
    } else {
        println!(
            "{} Nothing to delete for {}.",
            "SKIP".yellow().bold(),
            resource_id.cyan()
        );
    }
    Ok(deleted)
}

/// Run `ds hash get`
pub fn run_hash_get(
    catalog: &dyn Catalog,
    resource_id: &str,
    ledger: LedgerConfig,
) -> Result<Option<String>> {
    let hash = HashLedger::open(catalog, ledger).get_hash(resource_id)?;
    match &hash {
        Some(hash) => println!("{}", hash),
        None => println!(
            "{} No hash recorded for {}.",
            "NONE".yellow().bold(),
            resource_id.cyan()
        ),
    }
    Ok(hash)
}

/// Run `ds hash set`, creating the hash table first if needed.
pub fn run_hash_set(
    catalog: &dyn Catalog,
    resource_id: &str,
    hash: &str,
    ledger: LedgerConfig,
) -> Result<()> {
    let ledger = HashLedger::open(catalog, ledger);
    ledger.bootstrap()?;
    ledger.set_hash(resource_id, hash)?;
    println!(
        "{} Recorded hash for {}.",
        "Success!".green().bold(),
        resource_id.cyan()
    );
    Ok(())
}

fn parse_filters(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::user("Filters must be a JSON object.")),
        Err(e) => Err(CliError::user(format!("Invalid filters: {}", e))),
    }
}
