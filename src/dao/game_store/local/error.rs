//! Error types shared by the embedded on-device store.

use std::path::PathBuf;

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`LocalDaoError`] failures.
pub type LocalResult<T> = Result<T, LocalDaoError>;

/// Failures that can occur while interacting with the embedded database.
#[derive(Debug, Error)]
pub enum LocalDaoError {
    /// The parent directory of the database file could not be created.
    #[error("failed to create directory `{}` for the local database", path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem failure.
        #[source]
        source: std::io::Error,
    },
    /// The database file could not be opened or created.
    #[error("failed to open local database at `{}`", path.display())]
    Open {
        /// Database file path.
        path: PathBuf,
        /// Underlying redb failure.
        #[source]
        source: redb::DatabaseError,
    },
    /// A transaction, table access or commit failed.
    #[error("local database {operation} failed")]
    Database {
        /// Store operation that was running.
        operation: &'static str,
        /// Underlying redb failure.
        #[source]
        source: redb::Error,
    },
    /// A record could not be serialized before being written.
    #[error("failed to encode {kind} `{id}`")]
    Encode {
        /// Record kind, `game` or `user`.
        kind: &'static str,
        /// Key of the record.
        id: String,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored record could not be parsed.
    #[error("failed to decode {kind} `{id}`")]
    Decode {
        /// Record kind, `game` or `user`.
        kind: &'static str,
        /// Key of the record.
        id: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// A record without an id was handed to a write.
    #[error("{kind} record has an empty id")]
    MissingId {
        /// Record kind, `game` or `user`.
        kind: &'static str,
    },
    /// The blocking task running the operation panicked or was cancelled.
    #[error("local database task did not complete")]
    Task {
        /// Join failure reported by tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl LocalDaoError {
    /// Adapter for `map_err` on any redb failure.
    pub(super) fn database<E: Into<redb::Error>>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |source| LocalDaoError::Database {
            operation,
            source: source.into(),
        }
    }
}

impl From<LocalDaoError> for StorageError {
    fn from(err: LocalDaoError) -> Self {
        match &err {
            LocalDaoError::Encode { id, .. } => {
                let id = id.clone();
                StorageError::encoding(id, err)
            }
            LocalDaoError::Decode { id, .. } => {
                let id = id.clone();
                StorageError::decoding(id, err)
            }
            LocalDaoError::MissingId { .. } => StorageError::encoding(String::new(), err),
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
