//! Error types for pacer-core.
//!
//! Storage failures never reach callers of a persisted store: the
//! middleware's background tasks log them and degrade to defaults or to
//! the last in-memory state. `StoreError` exists so those tasks (and the
//! document construction path, the one place a caller does see an error)
//! can report with precision.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the storage document and persistence middleware.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the store document from disk
    #[error("Failed to read store document at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the store document to disk
    #[error("Failed to write store document at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but is not parseable JSON
    #[error("Store document at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// State for a named store could not be serialized
    #[error("Failed to serialize state for store '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to create the data directory
    #[error("Failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for StoreError
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
