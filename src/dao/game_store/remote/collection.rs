use futures::future::BoxFuture;

use crate::{dao::storage::StorageResult, dto::game::GameDto};

/// Largest number of keys a single membership query may carry.
pub const MEMBERSHIP_QUERY_LIMIT: usize = 10;

/// Document operations a remote backend must provide, keyed by game id.
pub trait DocumentCollection: Send + Sync {
    /// Read one document; `None` when it does not exist.
    fn get(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameDto>>>;
    /// Upsert with merge semantics: fields present in `dto` overwrite, others stay untouched.
    fn set_merge(&self, dto: GameDto) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete one document; `true` when a document was removed.
    fn delete(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every listed document in one request.
    fn batch_delete(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the documents whose id is in `ids` (at most [`MEMBERSHIP_QUERY_LIMIT`] keys).
    fn query_in(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<Vec<GameDto>>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
