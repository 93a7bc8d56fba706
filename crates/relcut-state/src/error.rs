//! Error types for relcut-state

use thiserror::Error;

/// Errors that can occur while talking to the record store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record does not exist
    #[error("{kind} {name} not found in namespace {namespace}")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// Record with the same name already exists
    #[error("{kind} {name} already exists in namespace {namespace}")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// Connection or transport-level failure
    #[error("Record store transport failed: {0}")]
    Transport(String),

    /// The API server answered with an error status
    #[error("Record store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Payload could not be decoded into a typed record
    #[error("Failed to decode record: {0}")]
    Decode(String),

    /// The server closed a watch with an error event
    #[error("Watch on {name} failed: {message}")]
    Watch { name: String, message: String },

    /// Store configuration is unusable
    #[error("Invalid record store configuration: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this error means the requested record is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Decode(err.to_string())
        } else {
            StorageError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Decode(err.to_string())
    }
}
