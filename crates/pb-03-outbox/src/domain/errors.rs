//! # Outbox Errors

use shared_bus::BusError;
use thiserror::Error;

/// Storage failures. A failed `commit` has written nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("outbox entry not found: {0}")]
    EntryNotFound(String),

    #[error("corrupt record at {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Failures of a publish scan. The entry that hit a bus error stays
/// unpublished and is retried on the next scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("bus rejected entry {entry_id}: {source}")]
    Bus {
        entry_id: String,
        #[source]
        source: BusError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode entry {entry_id}: {message}")]
    Encode { entry_id: String, message: String },
}
