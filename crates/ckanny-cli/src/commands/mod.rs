//! Command implementations for ckanny-cli
//!
//! Each command takes the catalog traits rather than a concrete client so it
//! can run against an in-memory catalog in tests.

pub mod datastore;
pub mod filestore;

pub use datastore::{run_delete, run_hash_get, run_hash_set, run_update, run_upload};
pub use filestore::{run_fetch, run_migrate};
