//! Error types for ckanny-core

use std::fmt;
use std::path::PathBuf;

/// Result type for ckanny-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which object of the hash ledger (or a datastore table) was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingItem {
    /// The owning package (dataset)
    Package,
    /// A filestore resource
    Resource,
    /// A datastore table
    Datastore,
}

impl fmt::Display for MissingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Package => "package",
            Self::Resource => "resource",
            Self::Datastore => "datastore",
        };
        f.write_str(name)
    }
}

/// The stage of a sync that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Fetch,
    Spool,
    Hash,
    Ledger,
    Parse,
    Delete,
    Create,
    Insert,
    RecordHash,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetching the resource",
            Self::Spool => "buffering the download",
            Self::Hash => "hashing the content",
            Self::Ledger => "reading the hash ledger",
            Self::Parse => "parsing the file",
            Self::Delete => "deleting the table",
            Self::Create => "creating the table",
            Self::Insert => "inserting records",
            Self::RecordHash => "recording the new hash",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in ckanny-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A ledger object or datastore table does not exist
    #[error("{message}")]
    NotFound { item: MissingItem, message: String },

    /// No organization matched the configured owner group
    #[error("No organization with display name `{name}` found")]
    OrganizationNotFound { name: String },

    /// The file is neither CSV nor XLS/XLSX
    #[error("Unsupported format `{extension}`: plugin for this extension not found")]
    UnsupportedFormat { extension: String },

    /// The file could not be read as the selected format
    #[error("Failed to parse {format} data: {message}")]
    Parse { format: String, message: String },

    /// A caller-supplied option failed validation
    #[error("Invalid option: {message}")]
    InvalidOption { message: String },

    /// The datastore refused to drop a read-only table
    #[error("Datastore table `{resource_id}` is read only. Set 'force' and try again.")]
    ReadOnly { resource_id: String },

    /// A batch of rows was rejected for its size
    #[error("Chunksize of {chunk_rows} rows too large. Try using a smaller chunksize.")]
    ChunkTooLarge {
        chunk_rows: usize,
        #[source]
        source: ckanny_api::Error,
    },

    /// The download ended before the announced content length
    #[error("Download truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    /// The settings file could not be read or parsed
    #[error("Failed to load settings from {path}: {message}")]
    Settings { path: PathBuf, message: String },

    /// A sync aborted; carries the resource and the failing step
    #[error("Sync of resource `{resource_id}` failed while {step}: {source}")]
    Sync {
        resource_id: String,
        step: SyncStep,
        #[source]
        source: Box<Error>,
    },

    // Transparent wrappers for underlying crate errors
    /// Error from the CKAN client
    #[error(transparent)]
    Api(#[from] ckanny_api::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(item: MissingItem, message: impl Into<String>) -> Self {
        Self::NotFound {
            item,
            message: message.into(),
        }
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption {
            message: message.into(),
        }
    }

    /// Attach the resource id and failing step of a sync.
    pub fn during(self, resource_id: &str, step: SyncStep) -> Self {
        Self::Sync {
            resource_id: resource_id.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// The underlying error with any sync context removed
    pub fn root(&self) -> &Error {
        match self {
            Self::Sync { source, .. } => source.root(),
            other => other,
        }
    }

    /// The failing step, when this error aborted a sync
    pub fn step(&self) -> Option<SyncStep> {
        match self {
            Self::Sync { step, .. } => Some(*step),
            _ => None,
        }
    }
}
