//! Daemon-side persistence of sealed secrets and access tokens.
//!
//! The store only ever sees envelopes; it has no key material and never
//! attempts to interpret a value.

mod sqlite;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// A stored secret row. `value` is an envelope, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub project: String,
    pub environment: String,
    pub key: String,
    pub value: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StorageError::Task(e.to_string())
    }
}

/// Current time as a sortable RFC 3339 UTC string with nanosecond precision.
pub(crate) fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
