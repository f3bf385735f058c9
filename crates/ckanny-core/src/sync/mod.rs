//! Synchronization of files into datastore tables
//!
//! A sync runs the same steps every time:
//!
//! 1. fetch the file and spool it
//! 2. hash the spooled bytes
//! 3. read the previous hash from the ledger (bootstrapping it once if needed)
//! 4. stop if nothing changed and the sync is not forced
//! 5. parse, then delete/create/insert the table
//! 6. record the new hash

mod engine;
mod options;

pub use engine::{SyncEngine, resource_id_from_path};
pub use options::{
    DEFAULT_CHUNK_BYTES, DEFAULT_CHUNK_ROWS, SyncDecision, SyncOptions, SyncOutcome,
    parse_key_list,
};
