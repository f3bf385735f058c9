//! Request and response types of the CKAN action API

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single datastore row keyed by field id
pub type Record = Map<String, Value>;

/// A package (dataset) as returned by `package_show` / `package_create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub owner_org: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A filestore resource as returned by `resource_show` / `resource_create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub perma_link: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Resource {
    /// The URL to download the resource from, preferring the permanent link.
    pub fn download_url(&self) -> Option<&str> {
        self.perma_link
            .as_deref()
            .filter(|link| !link.is_empty())
            .or_else(|| self.url.as_deref().filter(|url| !url.is_empty()))
    }
}

/// An organization as returned by `organization_list_for_user`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Payload of `package_create`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewPackage {
    pub name: String,
    pub owner_org: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Site-specific fields such as `package_creator` or `dataset_source`
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// Payload of `resource_create` and `resource_update`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewResource {
    /// Set for `resource_update`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CKAN rejects resources without a url, even for uploads
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A file attached to a resource request
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Column type of a datastore field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Int,
    Numeric,
    Bool,
    Timestamp,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Numeric => "numeric",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A datastore column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, FieldType::Text)
    }
}

/// Write mode of `datastore_upsert`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMethod {
    #[default]
    Insert,
    Upsert,
    Update,
}

impl fmt::Display for InsertMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// Payload of `datastore_create`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatastoreCreate {
    pub resource_id: String,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub force: bool,
}

/// Payload of `datastore_upsert`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatastoreUpsert {
    pub resource_id: String,
    pub records: Vec<Record>,
    pub method: InsertMethod,
    pub force: bool,
}

/// Payload of `datastore_delete`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatastoreDelete {
    pub resource_id: String,
    /// Without filters the whole table and its views are dropped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
    pub force: bool,
}

/// Payload of `datastore_search`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatastoreSearch {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filters: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Result of `datastore_search`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// A downloaded resource body together with the headers that describe it
pub struct Fetched {
    pub body: Box<dyn Read + Send>,
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub content_length: Option<u64>,
    /// Last path segment of the download URL, when it has one
    pub file_name: Option<String>,
}

impl Fetched {
    /// Wraps an in-memory body, mostly useful for tests and local sources.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let content_length = Some(bytes.len() as u64);
        Self {
            body: Box::new(std::io::Cursor::new(bytes)),
            content_type: None,
            encoding: None,
            content_length,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetched")
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("content_length", &self.content_length)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}
