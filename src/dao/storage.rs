use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by either store regardless of the underlying backend.
///
/// Not-found is never an error: lookups return `None` and deletes return `false`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Persistence or transport fault (commit, write, read, delete).
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the fault.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A game could not be projected into its stored representation.
    #[error("failed to encode game `{id}`")]
    Encoding {
        /// Game id.
        id: String,
        /// Projection failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be turned back into a game.
    #[error("failed to decode stored game `{id}`")]
    Decoding {
        /// Game id or document key.
        id: String,
        /// Parse or validation failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// At least one item of a batch failed; which one is not reported.
    #[error("batch {operation} did not complete for every item")]
    BatchIncomplete {
        /// Batch operation, `save` or `delete`.
        operation: &'static str,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct an encoding error for the game `id`.
    pub fn encoding(id: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Encoding {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Construct a decoding error for the stored record `id`.
    pub fn decoding(id: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Decoding {
            id: id.into(),
            source: Box::new(source),
        }
    }
}
