use std::path::PathBuf;

use status_core::StatusError;
use thiserror::Error;

/// Errors produced by the persisted monitor store and the migration engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file exists but could not be read.
    #[error("Failed to read database {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file (or its temporary sibling) could not be written.
    #[error("Failed to write database {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file is not valid JSON of the expected layout.
    #[error("Failed to parse database {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored record does not match the current monitor model.
    #[error("Record {id} could not be decoded: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record to be stored has no usable `id`.
    #[error("Record has no id")]
    MissingId,

    /// The database handle has been released.
    #[error("Database is closed")]
    Closed,

    /// A schema version string did not match `V{major}.{minor}.{patch}`.
    #[error("Invalid schema version: {0}")]
    InvalidVersion(String),

    /// A migration could not be applied; nothing was written.
    #[error("Migration '{migration}' failed on record {record}: {reason}")]
    Migration {
        migration: String,
        record: String,
        reason: String,
    },
}

/// Convenience alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for StatusError {
    fn from(err: StoreError) -> Self {
        StatusError::Storage(Box::new(err))
    }
}
