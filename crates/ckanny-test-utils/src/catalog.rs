//! [`MockCatalog`]: an in-memory CKAN with a call log.
//!
//! Mirrors the server-side rules the sync code relies on: tables can only be
//! created for existing resources, inserting into a missing table is
//! `NotFound`, and upserts replace rows that share the primary key.

use std::cell::RefCell;
use std::collections::BTreeMap;

use ckanny_api::{
    Catalog, ContentFetcher, DatastoreCreate, DatastoreDelete, DatastoreSearch, DatastoreUpsert,
    Error, Fetched, Field, InsertMethod, NewPackage, NewResource, Organization, Package, Record,
    Resource, Result, SearchResult, Upload,
};
use serde_json::{Value, json};

/// One recorded catalog request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PackageShow(String),
    PackageCreate(String),
    ResourceShow(String),
    ResourceCreate { package_id: String },
    ResourceUpdate { id: String },
    OrganizationList,
    DatastoreCreate { resource_id: String, primary_key: Vec<String> },
    DatastoreDelete(String),
    DatastoreUpsert { resource_id: String, method: InsertMethod, rows: usize },
    DatastoreSearch(String),
    Fetch(String),
}

impl Call {
    /// True for requests that change datastore state
    pub fn is_datastore_write(&self) -> bool {
        matches!(
            self,
            Call::DatastoreCreate { .. } | Call::DatastoreDelete(_) | Call::DatastoreUpsert { .. }
        )
    }

    /// The datastore table a request targets, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            Call::DatastoreCreate { resource_id, .. }
            | Call::DatastoreUpsert { resource_id, .. }
            | Call::DatastoreDelete(resource_id)
            | Call::DatastoreSearch(resource_id) => Some(resource_id),
            _ => None,
        }
    }
}

/// A datastore table held by the mock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub fields: Vec<Field>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Record>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    packages: Vec<Package>,
    resources: BTreeMap<String, Resource>,
    files: BTreeMap<String, StoredFile>,
    tables: BTreeMap<String, Table>,
    organizations: Vec<Organization>,
    denied: Vec<String>,
    /// resource id -> number of upsert batches to accept before failing
    failing_upserts: BTreeMap<String, usize>,
    /// number of upcoming searches that report a missing table
    failing_searches: usize,
    calls: Vec<Call>,
    next_id: usize,
}

impl State {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn find_package(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id || p.name == id)
    }

    fn package_with_resources(&self, package: &Package) -> Package {
        let mut package = package.clone();
        package.resources = self
            .resources
            .values()
            .filter(|r| r.package_id.as_deref() == Some(package.id.as_str()))
            .cloned()
            .collect();
        package
    }
}

/// In-memory implementation of [`Catalog`] and [`ContentFetcher`]
#[derive(Debug)]
pub struct MockCatalog {
    address: String,
    state: RefCell<State>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::with_address("http://mock.ckan")
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: RefCell::new(State::default()),
        }
    }

    /// Register an organization the current user administers.
    pub fn add_organization(&self, id: &str, display_name: &str) {
        self.state.borrow_mut().organizations.push(Organization {
            id: id.to_string(),
            name: id.to_string(),
            display_name: display_name.to_string(),
        });
    }

    /// Create a package directly, bypassing the call log. Returns its id.
    pub fn add_package(&self, name: &str) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.new_id("pkg");
        state.packages.push(Package {
            id: id.clone(),
            name: name.to_string(),
            ..Default::default()
        });
        id
    }

    /// Create a resource directly, bypassing the call log. Returns its id.
    pub fn add_resource(&self, package_id: &str, name: &str) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.new_id("res");
        state.resources.insert(
            id.clone(),
            Resource {
                id: id.clone(),
                package_id: Some(package_id.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
        );
        id
    }

    /// Store the file behind `resource_id`, creating the resource if needed.
    pub fn put_file(&self, resource_id: &str, file_name: &str, content_type: &str, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state
            .resources
            .entry(resource_id.to_string())
            .or_insert_with(|| Resource {
                id: resource_id.to_string(),
                name: Some(file_name.to_string()),
                url: Some(format!("http://mock.ckan/download/{}", file_name)),
                ..Default::default()
            });
        state.files.insert(
            resource_id.to_string(),
            StoredFile {
                file_name: Some(file_name.to_string()),
                content_type: Some(content_type.to_string()).filter(|c| !c.is_empty()),
                bytes: bytes.to_vec(),
            },
        );
    }

    /// Make `fetch` of `resource_id` fail with `NotAuthorized`.
    pub fn deny(&self, resource_id: &str) {
        self.state.borrow_mut().denied.push(resource_id.to_string());
    }

    /// Accept `after_batches` upserts into `resource_id`, then fail every
    /// following one.
    pub fn fail_upserts(&self, resource_id: &str, after_batches: usize) {
        self.state
            .borrow_mut()
            .failing_upserts
            .insert(resource_id.to_string(), after_batches);
    }

    /// Answer the next `times` datastore searches as if the table did not
    /// exist.
    pub fn fail_searches(&self, times: usize) {
        self.state.borrow_mut().failing_searches = times;
    }

    /// Seed a datastore table directly.
    pub fn put_table(&self, resource_id: &str, table: Table) {
        self.state
            .borrow_mut()
            .tables
            .insert(resource_id.to_string(), table);
    }

    pub fn table(&self, resource_id: &str) -> Option<Table> {
        self.state.borrow().tables.get(resource_id).cloned()
    }

    pub fn has_table(&self, resource_id: &str) -> bool {
        self.state.borrow().tables.contains_key(resource_id)
    }

    /// Every package currently named `name`
    pub fn packages_named(&self, name: &str) -> Vec<Package> {
        let state = self.state.borrow();
        state
            .packages
            .iter()
            .filter(|p| p.name == name)
            .map(|p| state.package_with_resources(p))
            .collect()
    }

    pub fn resource(&self, id: &str) -> Option<Resource> {
        self.state.borrow().resources.get(id).cloned()
    }

    pub fn file_bytes(&self, resource_id: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .files
            .get(resource_id)
            .map(|f| f.bytes.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Datastore writes that targeted `resource_id`
    pub fn writes_to(&self, resource_id: &str) -> Vec<Call> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.is_datastore_write() && c.table() == Some(resource_id))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn store_resource(&self, mut resource: Resource, upload: Option<Upload>) -> Resource {
        let mut state = self.state.borrow_mut();
        if let Some(upload) = upload {
            let format = resource.format.clone();
            state.files.insert(
                resource.id.clone(),
                StoredFile {
                    file_name: Some(upload.file_name.clone()),
                    content_type: format.map(|f| mime_for_format(&f).to_string()),
                    bytes: upload.bytes,
                },
            );
            resource.url = Some(format!("http://mock.ckan/download/{}", upload.file_name));
        }
        state.resources.insert(resource.id.clone(), resource.clone());
        resource
    }
}

fn mime_for_format(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "csv" => "text/csv",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

fn table_not_found(resource_id: &str) -> Error {
    Error::not_found(format!("Resource \"{}\" was not found.", resource_id))
}

fn key_of(row: &Record, primary_key: &[String]) -> Vec<Value> {
    primary_key
        .iter()
        .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
        .collect()
}

impl Catalog for MockCatalog {
    fn address(&self) -> &str {
        &self.address
    }

    fn package_show(&self, id: &str) -> Result<Package> {
        self.record(Call::PackageShow(id.to_string()));
        let state = self.state.borrow();
        state
            .find_package(id)
            .map(|p| state.package_with_resources(p))
            .ok_or_else(|| Error::not_found("Not found"))
    }

    fn package_create(&self, package: &NewPackage) -> Result<Package> {
        self.record(Call::PackageCreate(package.name.clone()));
        let mut state = self.state.borrow_mut();

        if state.find_package(&package.name).is_some() {
            return Err(Error::validation(
                "Validation error",
                json!({"name": ["That URL is already in use."]}),
            ));
        }
        if !state.organizations.iter().any(|o| o.id == package.owner_org) {
            return Err(Error::validation(
                "Validation error",
                json!({"owner_org": ["Organization does not exist"]}),
            ));
        }

        let created = Package {
            id: state.new_id("pkg"),
            name: package.name.clone(),
            title: package.title.clone(),
            owner_org: Some(package.owner_org.clone()),
            state: Some("active".into()),
            resources: Vec::new(),
        };
        state.packages.push(created.clone());
        Ok(created)
    }

    fn resource_show(&self, id: &str) -> Result<Resource> {
        self.record(Call::ResourceShow(id.to_string()));
        self.resource(id).ok_or_else(|| {
            Error::not_found(format!("Resource `{}` was not found in filestore.", id))
        })
    }

    fn resource_create(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource> {
        let package_id = resource.package_id.clone().unwrap_or_default();
        self.record(Call::ResourceCreate {
            package_id: package_id.clone(),
        });

        let id = {
            let mut state = self.state.borrow_mut();
            let package = state
                .find_package(&package_id)
                .map(|p| p.id.clone())
                .ok_or_else(|| Error::not_found("Not found"))?;
            (state.new_id("res"), package)
        };

        let created = Resource {
            id: id.0,
            package_id: Some(id.1),
            name: resource.name.clone(),
            url: Some(resource.url.clone()),
            format: resource.format.clone(),
            ..Default::default()
        };
        Ok(self.store_resource(created, upload))
    }

    fn resource_update(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource> {
        let id = resource.id.clone().unwrap_or_default();
        self.record(Call::ResourceUpdate { id: id.clone() });

        let mut existing = self
            .resource(&id)
            .ok_or_else(|| Error::not_found("Not found"))?;
        if resource.name.is_some() {
            existing.name = resource.name.clone();
        }
        if resource.format.is_some() {
            existing.format = resource.format.clone();
        }
        existing.url = Some(resource.url.clone());
        Ok(self.store_resource(existing, upload))
    }

    fn organization_list_for_user(&self, _permission: &str) -> Result<Vec<Organization>> {
        self.record(Call::OrganizationList);
        Ok(self.state.borrow().organizations.clone())
    }

    fn datastore_create(&self, request: &DatastoreCreate) -> Result<()> {
        self.record(Call::DatastoreCreate {
            resource_id: request.resource_id.clone(),
            primary_key: request.primary_key.clone(),
        });
        let mut state = self.state.borrow_mut();

        if !state.resources.contains_key(&request.resource_id) {
            return Err(Error::validation(
                "Validation error",
                json!({"resource_id": ["Not found: Resource"]}),
            ));
        }
        if let Some(missing) = request
            .primary_key
            .iter()
            .find(|k| !request.fields.iter().any(|f| &&f.id == k))
        {
            return Err(Error::validation(
                "Validation error",
                json!({"primary_key": [format!("field \"{}\" not in fields", missing)]}),
            ));
        }

        let table = state.tables.entry(request.resource_id.clone()).or_default();
        table.fields = request.fields.clone();
        table.primary_key = request.primary_key.clone();
        Ok(())
    }

    fn datastore_delete(&self, request: &DatastoreDelete) -> Result<()> {
        self.record(Call::DatastoreDelete(request.resource_id.clone()));
        let mut state = self.state.borrow_mut();

        match &request.filters {
            None => state
                .tables
                .remove(&request.resource_id)
                .map(drop)
                .ok_or_else(|| table_not_found(&request.resource_id)),
            Some(filters) => {
                let table = state
                    .tables
                    .get_mut(&request.resource_id)
                    .ok_or_else(|| table_not_found(&request.resource_id))?;
                table
                    .rows
                    .retain(|row| !filters.iter().all(|(k, v)| row.get(k) == Some(v)));
                Ok(())
            }
        }
    }

    fn datastore_upsert(&self, request: &DatastoreUpsert) -> Result<()> {
        self.record(Call::DatastoreUpsert {
            resource_id: request.resource_id.clone(),
            method: request.method,
            rows: request.records.len(),
        });
        let mut state = self.state.borrow_mut();

        if let Some(remaining) = state.failing_upserts.get_mut(&request.resource_id) {
            if *remaining == 0 {
                return Err(Error::Api {
                    kind: "Internal Server Error".into(),
                    message: "connection lost".into(),
                });
            }
            *remaining -= 1;
        }

        let table = state
            .tables
            .get_mut(&request.resource_id)
            .ok_or_else(|| table_not_found(&request.resource_id))?;
        let primary_key = table.primary_key.clone();

        if request.method == InsertMethod::Insert && !primary_key.is_empty() {
            let mut keys: Vec<Vec<Value>> =
                table.rows.iter().map(|r| key_of(r, &primary_key)).collect();
            for record in &request.records {
                let key = key_of(record, &primary_key);
                if keys.contains(&key) {
                    return Err(Error::validation(
                        "Validation error",
                        json!({"records": ["duplicate key value violates unique constraint"]}),
                    ));
                }
                keys.push(key);
            }
        }

        for record in &request.records {
            match request.method {
                InsertMethod::Insert => table.rows.push(record.clone()),
                InsertMethod::Upsert | InsertMethod::Update => {
                    if primary_key.is_empty() {
                        return Err(Error::validation(
                            "Validation error",
                            json!({"table": ["table does not have a unique key defined"]}),
                        ));
                    }
                    let key = key_of(record, &primary_key);
                    let position = table
                        .rows
                        .iter()
                        .position(|r| key_of(r, &primary_key) == key);
                    match position {
                        Some(index) => table.rows[index] = record.clone(),
                        None if request.method == InsertMethod::Upsert => {
                            table.rows.push(record.clone())
                        }
                        None => {
                            return Err(Error::validation(
                                "Validation error",
                                json!({"key": ["key not found"]}),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn datastore_search(&self, request: &DatastoreSearch) -> Result<SearchResult> {
        self.record(Call::DatastoreSearch(request.resource_id.clone()));
        let mut state = self.state.borrow_mut();
        if state.failing_searches > 0 {
            state.failing_searches -= 1;
            return Err(table_not_found(&request.resource_id));
        }
        let table = state
            .tables
            .get(&request.resource_id)
            .ok_or_else(|| table_not_found(&request.resource_id))?;

        let matching: Vec<&Record> = table
            .rows
            .iter()
            .filter(|row| request.filters.iter().all(|(k, v)| row.get(k) == Some(v)))
            .collect();
        let total = matching.len() as u64;

        let records = matching
            .into_iter()
            .take(request.limit.unwrap_or(usize::MAX))
            .map(|row| {
                if request.fields.is_empty() {
                    row.clone()
                } else {
                    row.iter()
                        .filter(|(k, _)| request.fields.contains(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                }
            })
            .collect();

        Ok(SearchResult {
            records,
            total: Some(total),
        })
    }
}

impl ContentFetcher for MockCatalog {
    fn fetch(&self, resource_id: &str) -> Result<Fetched> {
        self.record(Call::Fetch(resource_id.to_string()));
        let state = self.state.borrow();

        if state.denied.iter().any(|d| d == resource_id) {
            return Err(Error::not_authorized(format!(
                "Access to fetch resource {} was denied.",
                resource_id
            )));
        }

        let file = state.files.get(resource_id).ok_or_else(|| {
            Error::not_found(format!(
                "Resource `{}` was not found in filestore.",
                resource_id
            ))
        })?;

        let mut fetched = Fetched::from_bytes(file.bytes.clone());
        fetched.content_type = file.content_type.clone();
        fetched.file_name = file.file_name.clone();
        Ok(fetched)
    }
}
