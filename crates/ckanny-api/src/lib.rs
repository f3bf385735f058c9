//! Thin client for the CKAN action API
//!
//! Wraps the remote procedures ckanny needs (packages, resources,
//! organizations and the datastore) behind the [`Catalog`] and
//! [`ContentFetcher`] traits, with [`CkanClient`] as the HTTP implementation.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{Catalog, ContentFetcher};
pub use client::CkanClient;
pub use config::{API_KEY_ENV, ClientConfig, REMOTE_ENV, USER_AGENT_ENV, default_user_agent};
pub use error::{Error, Result};
pub use types::{
    DatastoreCreate, DatastoreDelete, DatastoreSearch, DatastoreUpsert, Fetched, Field, FieldType,
    InsertMethod, NewPackage, NewResource, Organization, Package, Record, Resource, SearchResult,
    Upload,
};
