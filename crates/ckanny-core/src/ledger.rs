//! Hash ledger
//!
//! A datastore table, kept in its own package, mapping each synced resource
//! id to the content hash it was last synced with:
//!
//! | datastore_id (primary key) | hash            |
//! |----------------------------|-----------------|
//! | `<resource id>`            | `sha256:<hex>`  |
//!
//! The ledger provisions itself: [`HashLedger::bootstrap`] creates whatever
//! part of the package, resource and table is missing.

use ckanny_api::{
    Catalog, DatastoreSearch, Field, InsertMethod, NewPackage, NewResource, Package, Record,
    Upload,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::datastore::{Datastore, TableOptions};
use crate::{Error, MissingItem, Result};

/// Ledger column holding the resource id
pub const KEY_FIELD: &str = "datastore_id";

/// Ledger column holding the content hash
pub const HASH_FIELD: &str = "hash";

/// Permission needed on the organization that owns a new ledger package
const OWNER_PERMISSION: &str = "admin_group";

/// How far the ledger has been provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerState {
    /// No ledger package
    Unprovisioned,
    /// The package exists but holds no resource
    PackageOnly { package_id: String },
    /// The resource exists but has no datastore table
    TableMissing { resource_id: String },
    /// Ready for reads and writes
    Ready { resource_id: String },
}

/// Read and write access to the hash ledger
pub struct HashLedger<'a> {
    catalog: &'a dyn Catalog,
    config: LedgerConfig,
}

impl<'a> HashLedger<'a> {
    /// Open the ledger described by `config`. No request is made until the
    /// ledger is used.
    pub fn open(catalog: &'a dyn Catalog, config: LedgerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The resource id of the ledger table.
    ///
    /// # Errors
    ///
    /// `NotFound(package)` without a ledger package, `NotFound(resource)`
    /// when the package holds no resource.
    pub fn table_id(&self) -> Result<String> {
        let package = self
            .catalog
            .package_show(&self.config.package)
            .map_err(|e| self.missing_package(e))?;

        self.ledger_resource(&package).ok_or_else(|| {
            Error::not_found(
                MissingItem::Resource,
                format!("No resources found in package `{}`.", self.config.package),
            )
        })
    }

    pub fn state(&self) -> Result<LedgerState> {
        let package = match self.catalog.package_show(&self.config.package) {
            Ok(package) => package,
            Err(e) if e.is_not_found() => return Ok(LedgerState::Unprovisioned),
            Err(e) => return Err(e.into()),
        };

        let Some(resource_id) = self.ledger_resource(&package) else {
            return Ok(LedgerState::PackageOnly {
                package_id: package.id,
            });
        };

        if Datastore::new(self.catalog).table_exists(&resource_id)? {
            Ok(LedgerState::Ready { resource_id })
        } else {
            Ok(LedgerState::TableMissing { resource_id })
        }
    }

    /// The hash last recorded for `resource_id`, or `None` if it was never
    /// synced.
    pub fn get_hash(&self, resource_id: &str) -> Result<Option<String>> {
        let table_id = self.table_id()?;

        let mut filters = Map::new();
        filters.insert(KEY_FIELD.to_string(), json!(resource_id));
        let request = DatastoreSearch {
            resource_id: table_id.clone(),
            filters,
            fields: vec![HASH_FIELD.to_string()],
            limit: Some(1),
        };

        let result = self.catalog.datastore_search(&request).map_err(|e| {
            if e.is_not_found() {
                missing_table(&table_id)
            } else {
                Error::Api(e)
            }
        })?;

        let hash = result
            .records
            .first()
            .and_then(|record| record.get(HASH_FIELD))
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!(resource_id, found = hash.is_some(), "Looked up hash");
        Ok(hash)
    }

    /// Record `hash` for `resource_id`, replacing any earlier entry.
    pub fn set_hash(&self, resource_id: &str, hash: &str) -> Result<()> {
        let table_id = self.table_id()?;

        let mut record = Record::new();
        record.insert(KEY_FIELD.to_string(), json!(resource_id));
        record.insert(HASH_FIELD.to_string(), json!(hash));

        Datastore::new(self.catalog)
            .insert_records(&table_id, vec![record], InsertMethod::Upsert, 1)
            .map_err(|e| match e {
                Error::NotFound { .. } => missing_table(&table_id),
                other => other,
            })?;
        debug!(resource_id, hash, "Recorded hash");
        Ok(())
    }

    /// Create whatever is missing of the ledger package, resource and
    /// table. Safe to call at any state; returns the ledger table id.
    pub fn bootstrap(&self) -> Result<String> {
        let state = self.state()?;
        debug!(?state, "Bootstrapping hash ledger");

        let resource_id = match state {
            LedgerState::Ready { resource_id } => return Ok(resource_id),
            LedgerState::TableMissing { resource_id } => resource_id,
            LedgerState::PackageOnly { package_id } => self.create_resource(&package_id)?,
            LedgerState::Unprovisioned => {
                let package_id = self.create_package()?;
                self.create_resource(&package_id)?
            }
        };

        let fields = [Field::text(KEY_FIELD), Field::text(HASH_FIELD)];
        let options = TableOptions {
            primary_key: vec![KEY_FIELD.to_string()],
            ..Default::default()
        };
        Datastore::new(self.catalog).create_table(&resource_id, &fields, &options)?;
        info!(resource_id = %resource_id, "Created hash table");
        Ok(resource_id)
    }

    fn create_package(&self) -> Result<String> {
        let organizations = self.catalog.organization_list_for_user(OWNER_PERMISSION)?;
        let owner = organizations
            .into_iter()
            .find(|org| org.display_name == self.config.owner_group)
            .ok_or_else(|| Error::OrganizationNotFound {
                name: self.config.owner_group.clone(),
            })?;

        let mut extras = Map::new();
        extras.insert("package_creator".into(), json!("Hash Table"));
        extras.insert("dataset_source".into(), json!("Multiple sources"));

        let package = self.catalog.package_create(&NewPackage {
            name: self.config.package.clone(),
            owner_org: owner.id,
            title: Some("Hash Table".into()),
            notes: Some("Datastore resource hash table".into()),
            extras,
        })?;
        info!(package = %package.name, "Created hash table package");
        Ok(package.id)
    }

    fn create_resource(&self, package_id: &str) -> Result<String> {
        let resource = NewResource {
            package_id: Some(package_id.to_string()),
            name: Some(self.config.resource_name.clone()),
            format: Some("csv".into()),
            ..Default::default()
        };
        let upload = Upload {
            file_name: self.config.resource_name.clone(),
            bytes: format!("{},{}\n", KEY_FIELD, HASH_FIELD).into_bytes(),
        };

        let created = self.catalog.resource_create(&resource, Some(upload))?;
        info!(resource_id = %created.id, "Created hash table resource");
        Ok(created.id)
    }

    /// The resource named like the ledger, else the package's first one
    fn ledger_resource(&self, package: &Package) -> Option<String> {
        package
            .resources
            .iter()
            .find(|r| r.name.as_deref() == Some(self.config.resource_name.as_str()))
            .or_else(|| package.resources.first())
            .map(|r| r.id.clone())
    }

    fn missing_package(&self, error: ckanny_api::Error) -> Error {
        if error.is_not_found() {
            Error::not_found(
                MissingItem::Package,
                format!("Package `{}` was not found.", self.config.package),
            )
        } else {
            Error::Api(error)
        }
    }
}

fn missing_table(table_id: &str) -> Error {
    Error::not_found(
        MissingItem::Datastore,
        format!("Table `{}` was not found in datastore.", table_id),
    )
}
