//! Shared test utilities for the ckanny workspace.
//!
//! This crate provides an in-memory catalog so the ledger and sync code can be
//! exercised without a CKAN instance. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`catalog`]: [`MockCatalog`], a recording double for `Catalog` and `ContentFetcher`

pub mod catalog;

pub use catalog::{Call, MockCatalog, Table};
