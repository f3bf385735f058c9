//! Core layer for ckanny
//!
//! This crate keeps CKAN datastore tables in step with the files behind
//! their resources:
//!
//! - **Hash ledger**: a self-provisioning table mapping resource ids to the
//!   content hash last synced
//! - **SyncEngine**: fetch, hash, compare and, when needed, rebuild a table
//! - **Tabular parsing**: CSV and XLS/XLSX into datastore fields and records
//! - **Filestore helpers**: download, upload and migrate resource files
//!
//! # Architecture
//!
//! ```text
//!           ckanny-cli
//!               |
//!          ckanny-core
//!               |
//!          ckanny-api
//! ```
//!
//! Everything remote goes through the [`ckanny_api::Catalog`] and
//! [`ckanny_api::ContentFetcher`] traits.
//!
//! # Example
//!
//! ```ignore
//! use ckanny_api::{CkanClient, ClientConfig};
//! use ckanny_core::{LedgerConfig, SyncEngine, SyncOptions, SyncOutcome};
//!
//! fn example() -> ckanny_core::Result<()> {
//!     let client = CkanClient::new(ClientConfig::new("https://data.example.org"))?;
//!     let engine = SyncEngine::new(&client, LedgerConfig::default());
//!     match engine.sync("resource-id", &client, &SyncOptions::default())? {
//!         SyncOutcome::Unchanged => {}
//!         SyncOutcome::Updated { rows } => println!("{} rows", rows),
//!     }
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod config;
pub mod datastore;
pub mod error;
pub mod filestore;
pub mod ledger;
pub mod spool;
pub mod sync;
pub mod tabular;

pub use checksum::{compute_content_checksum, compute_reader_checksum};
pub use config::{LedgerConfig, Settings};
pub use datastore::{Datastore, TableOptions};
pub use error::{Error, MissingItem, Result, SyncStep};
pub use filestore::{FetchedFile, ResourceSource, UploadTarget};
pub use ledger::{HashLedger, LedgerState};
pub use spool::{Spooled, spool};
pub use sync::{SyncDecision, SyncEngine, SyncOptions, SyncOutcome, parse_key_list};
pub use tabular::{ParseOptions, ParsedTable, TabularFormat};
