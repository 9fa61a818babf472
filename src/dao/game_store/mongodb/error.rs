use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Connection string as given.
        uri: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The server did not answer the ping sent on connect.
    #[error("MongoDB ping failed while connecting to database `{database}`")]
    InitialPing {
        /// Database name.
        database: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The server did not answer a health check ping.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// A DTO could not be laid out as a BSON document.
    #[error("failed to encode game `{id}` as a MongoDB document")]
    EncodeGame {
        /// Game id.
        id: String,
        /// BSON failure.
        #[source]
        source: mongodb::bson::ser::Error,
    },
    /// The merge upsert failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        /// Game id.
        id: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// The lookup by id failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Game id.
        id: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// A stored document does not match the game shape.
    #[error("stored game `{id}` does not match the expected shape")]
    DecodeGame {
        /// Game id.
        id: String,
        /// BSON failure.
        #[source]
        source: mongodb::bson::de::Error,
    },
    /// A single delete failed.
    #[error("failed to delete game `{id}`")]
    DeleteGame {
        /// Game id.
        id: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// A batch delete failed.
    #[error("failed to delete {count} game(s)")]
    DeleteGames {
        /// Ids in the batch.
        count: usize,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// A membership query failed.
    #[error("failed to query {count} game(s) by id")]
    QueryGames {
        /// Ids in the query.
        count: usize,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match &err {
            MongoDaoError::EncodeGame { id, .. } => {
                let id = id.clone();
                StorageError::encoding(id, err)
            }
            MongoDaoError::DecodeGame { id, .. } => {
                let id = id.clone();
                StorageError::decoding(id, err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
