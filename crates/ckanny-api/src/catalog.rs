//! Collaborator traits implemented by [`CkanClient`](crate::CkanClient)
//!
//! Higher layers only talk to a catalog through these traits so they can be
//! driven by an in-memory double in tests.

use crate::Result;
use crate::types::{
    DatastoreCreate, DatastoreDelete, DatastoreSearch, DatastoreUpsert, Fetched, NewPackage,
    NewResource, Organization, Package, Resource, SearchResult, Upload,
};

/// The subset of CKAN actions used by ckanny
pub trait Catalog {
    /// Base URL of the catalog, used to tell remotes apart
    fn address(&self) -> &str;

    fn package_show(&self, id: &str) -> Result<Package>;

    fn package_create(&self, package: &NewPackage) -> Result<Package>;

    fn resource_show(&self, id: &str) -> Result<Resource>;

    fn resource_create(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource>;

    fn resource_update(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource>;

    /// Organizations the current user holds `permission` on
    fn organization_list_for_user(&self, permission: &str) -> Result<Vec<Organization>>;

    fn datastore_create(&self, request: &DatastoreCreate) -> Result<()>;

    fn datastore_delete(&self, request: &DatastoreDelete) -> Result<()>;

    fn datastore_upsert(&self, request: &DatastoreUpsert) -> Result<()>;

    fn datastore_search(&self, request: &DatastoreSearch) -> Result<SearchResult>;
}

/// Downloads the file behind a filestore resource
pub trait ContentFetcher {
    /// Fails with `NotFound` or `NotAuthorized`
    fn fetch(&self, resource_id: &str) -> Result<Fetched>;
}
