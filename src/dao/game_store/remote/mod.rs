mod collection;
mod memory;
mod store;

use std::{fmt, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

use crate::dao::storage::{StorageError, StorageResult};

pub use collection::{DocumentCollection, MEMBERSHIP_QUERY_LIMIT};
pub use memory::{MemoryCollectionError, MemoryGameCollection};
pub use store::{DEFAULT_DELETE_BATCH_LIMIT, RemoteGameStore};

/// Which document collection backs the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// In-process map; nothing leaves the machine.
    #[default]
    Memory,
    /// MongoDB, configured through `MONGO_URI` / `MONGO_DB`.
    Mongo,
    /// CouchDB, configured through `COUCH_BASE_URL` / `COUCH_DB`.
    Couch,
}

impl RemoteBackend {
    /// Lowercase name as used in the configuration file.
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteBackend::Memory => "memory",
            RemoteBackend::Mongo => "mongo",
            RemoteBackend::Couch => "couch",
        }
    }
}

impl fmt::Display for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configured backend was left out of this build by feature selection.
#[derive(Debug, Error)]
#[error("remote backend `{backend}` is not compiled into this build")]
pub struct BackendDisabled {
    backend: RemoteBackend,
}

/// Connect the selected backend and wrap it in a [`RemoteGameStore`].
pub async fn connect(
    backend: RemoteBackend,
    delete_batch_limit: usize,
) -> StorageResult<RemoteGameStore> {
    let collection: Arc<dyn DocumentCollection> = match backend {
        RemoteBackend::Memory => Arc::new(MemoryGameCollection::new()),
        #[cfg(feature = "mongo-store")]
        RemoteBackend::Mongo => {
            use super::mongodb::{MongoConfig, MongoGameCollection};
            let config = MongoConfig::from_env().await?;
            Arc::new(MongoGameCollection::connect(config).await?)
        }
        #[cfg(feature = "couch-store")]
        RemoteBackend::Couch => {
            use super::couchdb::{CouchConfig, CouchGameCollection};
            let config = CouchConfig::from_env()?;
            Arc::new(CouchGameCollection::connect(config).await?)
        }
        #[allow(unreachable_patterns)]
        backend => {
            let err = BackendDisabled { backend };
            return Err(StorageError::unavailable(err.to_string(), err));
        }
    };

    Ok(RemoteGameStore::new(collection).with_delete_batch_limit(delete_batch_limit))
}
