//! Datastore table helpers
//!
//! Wraps the raw `datastore_*` actions with the error mapping and batching
//! the sync code needs.

use ckanny_api::{
    Catalog, DatastoreCreate, DatastoreDelete, DatastoreSearch, DatastoreUpsert, Field,
    InsertMethod, Record,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{Error, MissingItem, Result};

/// Key and index options for a new table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    pub primary_key: Vec<String>,
    pub indexes: Vec<String>,
    pub aliases: Vec<String>,
}

/// Datastore operations against one catalog
pub struct Datastore<'a> {
    catalog: &'a dyn Catalog,
    force: bool,
}

impl<'a> Datastore<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            force: false,
        }
    }

    /// Pass CKAN's `force` flag on every write, allowing edits of
    /// read-only tables.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// Create (or redefine) the table behind `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound(resource)` if the resource does not exist in the
    /// filestore; other rejections propagate unchanged.
    pub fn create_table(
        &self,
        resource_id: &str,
        fields: &[Field],
        options: &TableOptions,
    ) -> Result<()> {
        let request = DatastoreCreate {
            resource_id: resource_id.to_string(),
            fields: fields.to_vec(),
            primary_key: options.primary_key.clone(),
            indexes: options.indexes.clone(),
            aliases: options.aliases.clone(),
            force: self.force,
        };

        debug!(resource_id, fields = fields.len(), "Creating table");
        self.catalog.datastore_create(&request).map_err(|e| {
            let missing = e
                .field_errors("resource_id")
                .iter()
                .any(|m| m.starts_with("Not found"));
            if missing {
                Error::not_found(
                    MissingItem::Resource,
                    format!("Resource `{}` was not found in filestore.", resource_id),
                )
            } else {
                Error::Api(e)
            }
        })
    }

    /// Drop the table behind `resource_id`, or only the rows matching
    /// `filters`.
    ///
    /// Returns `false` when there was no table to delete.
    pub fn delete_table(&self, resource_id: &str, filters: Option<Map<String, Value>>) -> Result<bool> {
        let request = DatastoreDelete {
            resource_id: resource_id.to_string(),
            filters,
            force: self.force,
        };

        match self.catalog.datastore_delete(&request) {
            Ok(()) => {
                debug!(resource_id, "Deleted table");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                warn!(resource_id, "Can't delete. Table not found in datastore.");
                Ok(false)
            }
            Err(e) if e.has_field("read-only") => Err(Error::ReadOnly {
                resource_id: resource_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `records` in batches of `chunk_rows`. Returns the number of
    /// rows submitted.
    ///
    /// Batches are independent requests: when batch N fails, batches before
    /// it stay committed.
    pub fn insert_records(
        &self,
        resource_id: &str,
        records: Vec<Record>,
        method: InsertMethod,
        chunk_rows: usize,
    ) -> Result<usize> {
        let chunk_rows = chunk_rows.max(1);
        let total = records.len();
        let mut records = records.into_iter();
        let mut start = 0;

        while start < total {
            let batch: Vec<Record> = records.by_ref().take(chunk_rows).collect();
            let end = start + batch.len();
            info!("Adding records {} - {}", start + 1, end);

            let request = DatastoreUpsert {
                resource_id: resource_id.to_string(),
                records: batch,
                method,
                force: self.force,
            };
            self.catalog
                .datastore_upsert(&request)
                .map_err(|e| self.insert_error(resource_id, chunk_rows, e))?;
            start = end;
        }

        Ok(total)
    }

    /// True when a table exists behind `resource_id`.
    pub fn table_exists(&self, resource_id: &str) -> Result<bool> {
        let request = DatastoreSearch {
            resource_id: resource_id.to_string(),
            limit: Some(0),
            ..Default::default()
        };

        match self.catalog.datastore_search(&request) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_error(&self, resource_id: &str, chunk_rows: usize, error: ckanny_api::Error) -> Error {
        match error {
            ckanny_api::Error::PayloadTooLarge { .. } => Error::ChunkTooLarge {
                chunk_rows,
                source: error,
            },
            e if e.is_not_found() => Error::not_found(
                MissingItem::Datastore,
                format!("Table `{}` was not found in datastore.", resource_id),
            ),
            e => Error::Api(e),
        }
    }
}
