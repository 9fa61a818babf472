/// CouchDB document collection.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// On-device store backed by a redb file.
pub mod local;
/// MongoDB document collection.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Document store over any [`remote::DocumentCollection`].
pub mod remote;

use crate::dao::models::GameEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// CRUD contract shared by the on-device store and the remote document store.
///
/// Every fault is logged where it happens and surfaces as a [`crate::dao::storage::StorageError`]
/// kind. Missing records are values: `fetch` yields `None`, `delete` yields `false`.
pub trait GameStore: Send + Sync {
    /// Insert or update a single game.
    fn save(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist every game; reports one aggregate result.
    fn save_all(&self, games: Vec<GameEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the game with `id`.
    fn fetch(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Load every game whose id is listed in `ids`, dropping ids with no record.
    fn fetch_all(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Remove the game with `id`; `true` when a record was removed.
    fn delete(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove every game listed in `ids`.
    fn delete_all(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<bool>>;
    /// Check that the backing store answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
