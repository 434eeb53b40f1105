//! Store error types.

use thiserror::Error;

/// Errors raised by the persistent store and the tables built on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `ensure_started` has not completed.
    #[error("store not started")]
    NotStarted,

    /// A table was written before its migration created it.
    #[error("table {0} does not exist")]
    MissingTable(&'static str),

    /// A migration step failed; the schema version was not advanced.
    #[error("migration to v{version} failed: {reason}")]
    Migration {
        /// Version the failed step would have produced.
        version: u32,
        /// Underlying cause.
        reason: String,
    },

    /// The snapshot blob could not be decoded.
    #[error("snapshot: {0}")]
    Snapshot(String),

    /// Durable byte storage failure.
    #[error("storage: {0}")]
    Storage(String),

    /// A row field could not be encoded.
    #[error("serialization: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
