//! Error types for ckanny-api

use serde_json::Value;

/// Result type for ckanny-api operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the CKAN action API or the transport underneath it
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested object does not exist on the remote catalog
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The API key is missing or lacks the required permission
    #[error("Not authorized: {message}")]
    NotAuthorized { message: String },

    /// The remote rejected the request payload
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        /// Field-level errors as returned by CKAN, e.g. `{"resource_id": ["Not found: Resource"]}`
        fields: Value,
    },

    /// Any other `success: false` response
    #[error("{kind}: {message}")]
    Api { kind: String, message: String },

    /// The request body was rejected for its size, or the connection was
    /// dropped while it was being sent
    #[error("Payload too large for {action}")]
    PayloadTooLarge { action: String },

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unexpected HTTP status outside the action envelope
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Response body could not be decoded
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>, fields: Value) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the messages CKAN attached to a validation error for `field`.
    pub fn field_errors(&self, field: &str) -> Vec<&str> {
        match self {
            Self::Validation { fields, .. } => fields
                .get(field)
                .and_then(Value::as_array)
                .map(|messages| messages.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// True when a validation error carries `key` at the top level.
    pub fn has_field(&self, key: &str) -> bool {
        matches!(self, Self::Validation { fields, .. } if fields.get(key).is_some())
    }
}
