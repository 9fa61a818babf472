use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::future::{BoxFuture, join_all};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dao::{
        game_store::GameStore,
        models::GameEntity,
        storage::{StorageError, StorageResult},
    },
    dto::game::GameDto,
};

use super::collection::{DocumentCollection, MEMBERSHIP_QUERY_LIMIT};

/// Default ceiling for documents removed by one batch delete request.
pub const DEFAULT_DELETE_BATCH_LIMIT: usize = 500;

/// Game store writing transport DTOs into a remote document collection.
#[derive(Clone)]
pub struct RemoteGameStore {
    collection: Arc<dyn DocumentCollection>,
    delete_batch_limit: usize,
}

impl RemoteGameStore {
    /// Wrap a document collection.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self {
            collection,
            delete_batch_limit: DEFAULT_DELETE_BATCH_LIMIT,
        }
    }

    /// Bound the number of ids sent in a single batch delete request.
    pub fn with_delete_batch_limit(mut self, limit: usize) -> Self {
        self.delete_batch_limit = limit.max(1);
        self
    }

    /// Encode and merge-upsert a single game.
    pub async fn save_game(&self, game: GameEntity) -> StorageResult<()> {
        let dto = GameDto::from_entity(&game).map_err(|err| {
            warn!(id = %game.id, error = %err, "failed to encode game for remote store");
            StorageError::encoding(game.id.clone(), err)
        })?;

        self.collection.set_merge(dto).await.inspect_err(|err| {
            warn!(id = %game.id, error = %err, "remote save failed");
        })
    }

    /// Upsert every game concurrently; succeeds only if every single save succeeded.
    pub async fn save_games(&self, games: Vec<GameEntity>) -> StorageResult<()> {
        if games.is_empty() {
            return Ok(());
        }

        let count = games.len();
        let results = join_all(games.into_iter().map(|game| self.save_game(game))).await;
        let failed = results.iter().filter(|result| result.is_err()).count();

        if failed > 0 {
            warn!(count, failed, "remote batch save incomplete");
            return Err(StorageError::BatchIncomplete { operation: "save" });
        }
        debug!(count, "remote batch save committed");
        Ok(())
    }

    /// Read and decode a single game.
    pub async fn fetch_game(&self, id: String) -> StorageResult<Option<GameEntity>> {
        let dto = self.collection.get(id.clone()).await.inspect_err(|err| {
            warn!(%id, error = %err, "remote fetch failed");
        })?;

        dto.map(|dto| {
            dto.into_entity().map_err(|err| {
                warn!(%id, error = %err, "stored remote game failed validation");
                StorageError::decoding(id.clone(), err)
            })
        })
        .transpose()
    }

    /// Fetch the listed games in chunked membership queries and return them in `ids` order.
    ///
    /// Every chunk runs on its own task and sends decoded games to a single collector,
    /// which owns the accumulated map. Ids with no document, failed chunks and invalid
    /// documents are dropped from the result.
    pub async fn fetch_games(&self, ids: Vec<String>) -> StorageResult<Vec<GameEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<GameEntity>();
        for chunk in unique.chunks(MEMBERSHIP_QUERY_LIMIT) {
            let collection = Arc::clone(&self.collection);
            let chunk = chunk.to_vec();
            let tx = tx.clone();
            tokio::spawn(async move {
                let size = chunk.len();
                let dtos = match collection.query_in(chunk).await {
                    Ok(dtos) => dtos,
                    Err(err) => {
                        warn!(size, error = %err, "remote membership query failed");
                        return;
                    }
                };
                for dto in dtos {
                    let id = dto.id.clone();
                    match dto.into_entity() {
                        Ok(game) => {
                            // The collector only stops once every sender is gone.
                            let _ = tx.send(game);
                        }
                        Err(err) => {
                            warn!(%id, error = %err, "stored remote game failed validation")
                        }
                    }
                }
            });
        }
        // Channel closes once every chunk task has finished.
        drop(tx);

        let mut found: HashMap<String, GameEntity> = HashMap::with_capacity(unique.len());
        while let Some(game) = rx.recv().await {
            found.insert(game.id.clone(), game);
        }

        debug!(
            requested = ids.len(),
            found = found.len(),
            "remote batch fetch finished"
        );
        Ok(ids
            .iter()
            .filter_map(|id| found.get(id).cloned())
            .collect())
    }

    /// Delete a single document.
    pub async fn delete_game(&self, id: String) -> StorageResult<bool> {
        self.collection.delete(id.clone()).await.inspect_err(|err| {
            warn!(%id, error = %err, "remote delete failed");
        })
    }

    /// Delete every listed game with one batch request per `delete_batch_limit` ids.
    ///
    /// Every sub-batch is attempted even when an earlier one failed.
    pub async fn delete_games(&self, ids: Vec<String>) -> StorageResult<bool> {
        if ids.is_empty() {
            return Ok(true);
        }

        let mut failed = false;
        for batch in ids.chunks(self.delete_batch_limit) {
            if let Err(err) = self.collection.batch_delete(batch.to_vec()).await {
                warn!(size = batch.len(), error = %err, "remote batch delete failed");
                failed = true;
            }
        }

        if failed {
            return Err(StorageError::BatchIncomplete {
                operation: "delete",
            });
        }
        Ok(true)
    }
}

impl GameStore for RemoteGameStore {
    fn save(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await })
    }

    fn save_all(&self, games: Vec<GameEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_games(games).await })
    }

    fn fetch(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_game(id).await })
    }

    fn fetch_all(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_games(ids).await })
    }

    fn delete(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await })
    }

    fn delete_all(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_games(ids).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.collection.health_check()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use serde_json::json;

    use super::*;
    use crate::dao::{game_store::remote::MemoryGameCollection, models::PlayerEntity};

    fn store() -> (MemoryGameCollection, RemoteGameStore) {
        let collection = MemoryGameCollection::new();
        let store = RemoteGameStore::new(Arc::new(collection.clone()));
        (collection, store)
    }

    fn game(id: &str) -> GameEntity {
        GameEntity {
            id: id.into(),
            host_user_id: "user-1".into(),
            course_id: Some("harbor-mini-golf-0a1b2c3d".into()),
            location_name: Some("Harbor Mini Golf".into()),
            number_of_holes: 9,
            players: vec![PlayerEntity {
                id: "p1".into(),
                name: "Ada".into(),
                strokes: vec![2, 3],
            }],
            started_at: UNIX_EPOCH + Duration::from_millis(1_700_000_000_250),
            completed: false,
        }
    }

    fn game_id(n: usize) -> String {
        format!("game-{n:02}")
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let (_collection, store) = store();
        let original = game("g1");

        store.save_game(original.clone()).await.unwrap();

        assert_eq!(store.fetch_game("g1".into()).await.unwrap(), Some(original));
        assert_eq!(store.fetch_game("missing".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_merges_into_existing_document() {
        let (_collection, store) = store();
        store.save_game(game("g1")).await.unwrap();

        let mut update = game("g1");
        update.location_name = None;
        update.completed = true;
        store.save_game(update).await.unwrap();

        let fetched = store.fetch_game("g1".into()).await.unwrap().unwrap();
        assert!(fetched.completed);
        assert_eq!(fetched.location_name.as_deref(), Some("Harbor Mini Golf"));
    }

    #[tokio::test]
    async fn invalid_game_is_an_encoding_error() {
        let (collection, store) = store();
        let mut invalid = game("g1");
        invalid.number_of_holes = 0;

        let err = store.save_game(invalid).await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { ref id, .. } if id == "g1"));
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn sub_millisecond_start_time_is_refused_not_truncated() {
        let (collection, store) = store();
        let mut precise = game("g1");
        precise.started_at = UNIX_EPOCH + Duration::new(1_700_000_000, 42);

        let err = store.save_game(precise).await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { ref id, .. } if id == "g1"));
        assert!(collection.is_empty());

        let mut whole = game("g1");
        whole.started_at = UNIX_EPOCH + Duration::new(1_700_000_000, 42_000_000);
        store.save_game(whole.clone()).await.unwrap();
        assert_eq!(store.fetch_game("g1".into()).await.unwrap(), Some(whole));
    }

    #[tokio::test]
    async fn malformed_document_is_a_decoding_error() {
        let (collection, store) = store();
        collection.insert_raw("g1", json!({ "id": "g1", "numberOfHoles": "nine" }));

        let err = store.fetch_game("g1".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::Decoding { .. }));
    }

    #[tokio::test]
    async fn delete_then_fetch_is_none() {
        let (_collection, store) = store();
        store.save_game(game("g1")).await.unwrap();

        assert!(store.delete_game("g1".into()).await.unwrap());
        assert_eq!(store.fetch_game("g1".into()).await.unwrap(), None);
        assert!(!store.delete_game("g1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn empty_batches_are_trivial() {
        let (collection, store) = store();
        store.save_games(Vec::new()).await.unwrap();
        assert!(store.fetch_games(Vec::new()).await.unwrap().is_empty());
        assert!(store.delete_games(Vec::new()).await.unwrap());
        assert_eq!(collection.query_count(), 0);
        assert_eq!(collection.batch_delete_count(), 0);
    }

    #[tokio::test]
    async fn save_games_reports_failure_but_completes_the_rest() {
        let (collection, store) = store();
        collection.reject_requests_for("game-02");

        let games: Vec<GameEntity> = (1..=5).map(|n| game(&game_id(n))).collect();
        let err = store.save_games(games).await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::BatchIncomplete { operation: "save" }
        ));
        assert_eq!(collection.len(), 4);
    }

    #[tokio::test]
    async fn fetch_games_preserves_caller_order_across_chunks() {
        let (collection, store) = store();
        let present: Vec<GameEntity> = (1..=10)
            .chain(std::iter::once(15))
            .map(|n| game(&game_id(n)))
            .collect();
        store.save_games(present).await.unwrap();

        let ids: Vec<String> = (1..=15).map(game_id).collect();
        let fetched = store.fetch_games(ids).await.unwrap();

        let expected: Vec<String> = (1..=10).chain(std::iter::once(15)).map(game_id).collect();
        let fetched_ids: Vec<String> = fetched.into_iter().map(|g| g.id).collect();
        assert_eq!(fetched_ids, expected);
        assert_eq!(collection.query_count(), 2);
    }

    #[tokio::test]
    async fn fetch_games_follows_caller_order_not_store_order() {
        let (_collection, store) = store();
        store
            .save_games(vec![game("a"), game("b"), game("c")])
            .await
            .unwrap();

        let fetched = store
            .fetch_games(vec!["c".into(), "missing".into(), "a".into(), "b".into()])
            .await
            .unwrap();
        let fetched_ids: Vec<&str> = fetched.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(fetched_ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn fetch_games_drops_failed_chunks() {
        let (collection, store) = store();
        let games: Vec<GameEntity> = (1..=12).map(|n| game(&game_id(n))).collect();
        store.save_games(games).await.unwrap();
        collection.reject_requests_for("game-03");

        let fetched = store
            .fetch_games((1..=12).map(game_id).collect())
            .await
            .unwrap();
        let fetched_ids: Vec<String> = fetched.into_iter().map(|g| g.id).collect();
        assert_eq!(fetched_ids, vec![game_id(11), game_id(12)]);
    }

    #[tokio::test]
    async fn delete_games_splits_into_bounded_batches() {
        let (collection, store) = store();
        let store = store.with_delete_batch_limit(2);
        let games: Vec<GameEntity> = (1..=5).map(|n| game(&game_id(n))).collect();
        store.save_games(games).await.unwrap();

        assert!(
            store
                .delete_games((1..=5).map(game_id).collect())
                .await
                .unwrap()
        );
        assert_eq!(collection.batch_delete_count(), 3);
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn delete_games_attempts_every_batch() {
        let (collection, store) = store();
        let store = store.with_delete_batch_limit(2);
        let games: Vec<GameEntity> = (1..=4).map(|n| game(&game_id(n))).collect();
        store.save_games(games).await.unwrap();
        collection.reject_requests_for("game-01");

        let err = store
            .delete_games((1..=4).map(game_id).collect())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::BatchIncomplete {
                operation: "delete"
            }
        ));
        assert_eq!(collection.batch_delete_count(), 2);
        assert_eq!(collection.len(), 2);
    }
}
