//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The configured server address is not a usable base URL.
    #[error("invalid CouchDB url `{url}`: {reason}")]
    InvalidUrl {
        /// Address as configured.
        url: String,
        /// Why it was refused.
        reason: String,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// The id names a CouchDB system endpoint (`_design/..`, `_all_docs`, ...).
    #[error("`{id}` is reserved by CouchDB and cannot be used as a game id")]
    ReservedId {
        /// Refused id.
        id: String,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Document id or endpoint.
        path: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Document id or endpoint.
        path: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Document id or endpoint.
        path: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// A DTO could not be laid out as a CouchDB document.
    #[error("failed to encode game `{id}` as a CouchDB document")]
    EncodeDocument {
        /// Game id.
        id: String,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored document does not match the game shape.
    #[error("stored game `{id}` does not match the expected shape")]
    DecodeDocument {
        /// Game id.
        id: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// `_bulk_docs` answered but refused some of the deletions.
    #[error("CouchDB refused to delete {} document(s): {failed:?}", failed.len())]
    BulkRejected {
        /// Ids whose tombstone was refused.
        failed: Vec<String>,
    },
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match &err {
            CouchDaoError::EncodeDocument { id, .. } | CouchDaoError::ReservedId { id } => {
                let id = id.clone();
                StorageError::encoding(id, err)
            }
            CouchDaoError::DecodeDocument { id, .. } => {
                let id = id.clone();
                StorageError::decoding(id, err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
