use std::{collections::HashSet, fs, path::Path, sync::Arc};

use futures::future::{BoxFuture, join_all};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

use super::error::{LocalDaoError, LocalResult};

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

const GAMES_TABLE: RecordTable = TableDefinition::new("games");
const USERS_TABLE: RecordTable = TableDefinition::new("users");

/// On-device game store backed by an embedded redb file.
#[derive(Clone)]
pub struct LocalGameStore {
    db: Arc<Database>,
}

impl LocalGameStore {
    /// Open (or create) the database file at `path` and make sure both tables exist.
    pub fn open(path: impl AsRef<Path>) -> LocalResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LocalDaoError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let db = Database::create(path).map_err(|source| LocalDaoError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let txn = db.begin_write().map_err(LocalDaoError::database("init"))?;
        txn.open_table(GAMES_TABLE)
            .map_err(LocalDaoError::database("init"))?;
        txn.open_table(USERS_TABLE)
            .map_err(LocalDaoError::database("init"))?;
        txn.commit().map_err(LocalDaoError::database("init"))?;

        info!(path = %path.display(), "opened local game store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or update a single game.
    pub async fn save_game(&self, game: GameEntity) -> StorageResult<()> {
        self.run_blocking("save", move |store| store.put_games(&[game]))
            .await
    }

    /// Insert every game inside one transaction; nothing is written if any insert fails.
    pub async fn save_games(&self, games: Vec<GameEntity>) -> StorageResult<()> {
        if games.is_empty() {
            return Ok(());
        }
        self.run_blocking("save_all", move |store| store.put_games(&games))
            .await
    }

    /// Load the game with `id`.
    pub async fn fetch_game(&self, id: String) -> StorageResult<Option<GameEntity>> {
        self.run_blocking("fetch", move |store| store.get_game(&id))
            .await
    }

    /// Load every stored game and keep those listed in `ids`. Order follows storage order.
    pub async fn fetch_games(&self, ids: Vec<String>) -> StorageResult<Vec<GameEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<String> = ids.into_iter().collect();
        self.run_blocking("fetch_all", move |store| {
            let games = store.list_records::<GameEntity>(GAMES_TABLE, "game")?;
            Ok(games
                .into_iter()
                .filter(|game| wanted.contains(&game.id))
                .collect())
        })
        .await
    }

    /// Remove the game with `id`; `true` when it existed.
    pub async fn delete_game(&self, id: String) -> StorageResult<bool> {
        self.run_blocking("delete", move |store| store.remove_game(&id))
            .await
    }

    /// Delete every listed game concurrently and wait for all of them.
    ///
    /// The result is the logical AND of the individual deletes, so a missing id yields
    /// `false` while the others are still removed.
    pub async fn delete_games(&self, ids: Vec<String>) -> StorageResult<bool> {
        if ids.is_empty() {
            return Ok(true);
        }

        let results = join_all(ids.into_iter().map(|id| self.delete_game(id))).await;

        let mut all_deleted = true;
        let mut failed = false;
        for result in results {
            match result {
                Ok(deleted) => all_deleted &= deleted,
                Err(_) => failed = true,
            }
        }

        if failed {
            return Err(StorageError::BatchIncomplete {
                operation: "delete",
            });
        }
        Ok(all_deleted)
    }

    /// Return the guest game only when no stored user references it.
    pub async fn fetch_guest_game(&self) -> StorageResult<Option<GameEntity>> {
        self.run_blocking("fetch_guest", |store| {
            let games = store.list_records::<GameEntity>(GAMES_TABLE, "game")?;
            let Some(guest) = games.into_iter().find(GameEntity::is_guest_game) else {
                return Ok(None);
            };

            let users = store.list_records::<UserEntity>(USERS_TABLE, "user")?;
            if let Some(owner) = users.iter().find(|user| user.references(&guest.id)) {
                debug!(game_id = %guest.id, user_id = %owner.id, "guest game is referenced by a user");
                return Ok(None);
            }

            Ok(Some(guest))
        })
        .await
    }

    /// Delete the game whose host marks it as a guest game, without checking references.
    pub async fn delete_guest_game(&self) -> StorageResult<bool> {
        self.run_blocking("delete_guest", |store| {
            let txn = store
                .db
                .begin_write()
                .map_err(LocalDaoError::database("delete_guest"))?;
            let removed = {
                let mut table = txn
                    .open_table(GAMES_TABLE)
                    .map_err(LocalDaoError::database("delete_guest"))?;

                let mut guest_id = None;
                for entry in table.iter().map_err(LocalDaoError::database("delete_guest"))? {
                    let (key, value) = entry.map_err(LocalDaoError::database("delete_guest"))?;
                    let game: GameEntity = decode("game", key.value(), value.value())?;
                    if game.is_guest_game() {
                        guest_id = Some(game.id);
                        break;
                    }
                }

                let Some(id) = guest_id else {
                    return Ok(false);
                };
                table
                    .remove(id.as_str())
                    .map_err(LocalDaoError::database("delete_guest"))?
                    .is_some()
            };
            txn.commit()
                .map_err(LocalDaoError::database("delete_guest"))?;
            Ok(removed)
        })
        .await
    }

    /// Insert or update a user record.
    pub async fn save_user(&self, user: UserEntity) -> StorageResult<()> {
        self.run_blocking("save_user", move |store| {
            let bytes = encode("user", &user.id, &user)?;
            let txn = store
                .db
                .begin_write()
                .map_err(LocalDaoError::database("save_user"))?;
            {
                let mut table = txn
                    .open_table(USERS_TABLE)
                    .map_err(LocalDaoError::database("save_user"))?;
                table
                    .insert(user.id.as_str(), bytes.as_slice())
                    .map_err(LocalDaoError::database("save_user"))?;
            }
            txn.commit().map_err(LocalDaoError::database("save_user"))
        })
        .await
    }

    /// Load the user with `id`.
    pub async fn fetch_user(&self, id: String) -> StorageResult<Option<UserEntity>> {
        self.run_blocking("fetch_user", move |store| {
            let txn = store
                .db
                .begin_read()
                .map_err(LocalDaoError::database("fetch_user"))?;
            let table = txn
                .open_table(USERS_TABLE)
                .map_err(LocalDaoError::database("fetch_user"))?;
            let record = table
                .get(id.as_str())
                .map_err(LocalDaoError::database("fetch_user"))?;
            record
                .map(|value| decode("user", &id, value.value()))
                .transpose()
        })
        .await
    }

    /// Load every stored user.
    pub async fn fetch_users(&self) -> StorageResult<Vec<UserEntity>> {
        self.run_blocking("fetch_users", |store| {
            store.list_records::<UserEntity>(USERS_TABLE, "user")
        })
        .await
    }

    /// Run a blocking database closure off the async executor and log any failure.
    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalGameStore) -> LocalResult<T> + Send + 'static,
    {
        let store = self.clone();
        let result = match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(result) => result,
            Err(source) => Err(LocalDaoError::Task { source }),
        };

        result.map_err(|err| {
            warn!(operation, error = %err, "local store operation failed");
            err.into()
        })
    }

    fn put_games(&self, games: &[GameEntity]) -> LocalResult<()> {
        let encoded = games
            .iter()
            .map(|game| encode("game", &game.id, game).map(|bytes| (game.id.as_str(), bytes)))
            .collect::<LocalResult<Vec<_>>>()?;

        let txn = self
            .db
            .begin_write()
            .map_err(LocalDaoError::database("save"))?;
        {
            let mut table = txn
                .open_table(GAMES_TABLE)
                .map_err(LocalDaoError::database("save"))?;
            for (id, bytes) in &encoded {
                if id.is_empty() {
                    return Err(LocalDaoError::MissingId { kind: "game" });
                }
                table
                    .insert(*id, bytes.as_slice())
                    .map_err(LocalDaoError::database("save"))?;
            }
        }
        txn.commit().map_err(LocalDaoError::database("save"))
    }

    fn get_game(&self, id: &str) -> LocalResult<Option<GameEntity>> {
        let txn = self
            .db
            .begin_read()
            .map_err(LocalDaoError::database("fetch"))?;
        let table = txn
            .open_table(GAMES_TABLE)
            .map_err(LocalDaoError::database("fetch"))?;
        let record = table.get(id).map_err(LocalDaoError::database("fetch"))?;
        record
            .map(|value| decode("game", id, value.value()))
            .transpose()
    }

    fn remove_game(&self, id: &str) -> LocalResult<bool> {
        let txn = self
            .db
            .begin_write()
            .map_err(LocalDaoError::database("delete"))?;
        let removed = {
            let mut table = txn
                .open_table(GAMES_TABLE)
                .map_err(LocalDaoError::database("delete"))?;
            table
                .remove(id)
                .map_err(LocalDaoError::database("delete"))?
                .is_some()
        };
        txn.commit().map_err(LocalDaoError::database("delete"))?;
        Ok(removed)
    }

    fn list_records<T: DeserializeOwned>(
        &self,
        definition: RecordTable,
        kind: &'static str,
    ) -> LocalResult<Vec<T>> {
        let txn = self
            .db
            .begin_read()
            .map_err(LocalDaoError::database("list"))?;
        let table = txn
            .open_table(definition)
            .map_err(LocalDaoError::database("list"))?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(LocalDaoError::database("list"))? {
            let (key, value) = entry.map_err(LocalDaoError::database("list"))?;
            records.push(decode(kind, key.value(), value.value())?);
        }
        Ok(records)
    }
}

fn encode<T: Serialize>(kind: &'static str, id: &str, record: &T) -> LocalResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|source| LocalDaoError::Encode {
        kind,
        id: id.to_owned(),
        source,
    })
}

fn decode<T: DeserializeOwned>(kind: &'static str, id: &str, bytes: &[u8]) -> LocalResult<T> {
    serde_json::from_slice(bytes).map_err(|source| LocalDaoError::Decode {
        kind,
        id: id.to_owned(),
        source,
    })
}

impl GameStore for LocalGameStore {
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
        let store = self.clone();
        Box::pin(async move {
            store
                .run_blocking("health_check", |store| {
                    let txn = store
                        .db
                        .begin_read()
                        .map_err(LocalDaoError::database("health_check"))?;
                    txn.open_table(GAMES_TABLE)
                        .map_err(LocalDaoError::database("health_check"))?;
                    Ok(())
                })
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use tempfile::TempDir;

    use super::*;
    use crate::dao::models::PlayerEntity;

    fn open_temp() -> (TempDir, LocalGameStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalGameStore::open(dir.path().join("nested").join("games.redb")).unwrap();
        (dir, store)
    }

    fn game(id: &str, host: &str) -> GameEntity {
        GameEntity {
            id: id.into(),
            host_user_id: host.into(),
            course_id: None,
            location_name: Some("Harbor Mini Golf".into()),
            number_of_holes: 18,
            players: vec![PlayerEntity {
                id: "p1".into(),
                name: "Ada".into(),
                strokes: vec![3, 2, 4],
            }],
            started_at: UNIX_EPOCH + Duration::new(1_700_000_000, 42),
            completed: false,
        }
    }

    fn ids(games: &[GameEntity]) -> Vec<String> {
        let mut ids: Vec<String> = games.iter().map(|g| g.id.clone()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let (_dir, store) = open_temp();
        let original = game("g1", "user-1");

        store.save_game(original.clone()).await.unwrap();

        assert_eq!(store.fetch_game("g1".into()).await.unwrap(), Some(original));
        assert_eq!(store.fetch_game("missing".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_overwrites_same_id() {
        let (_dir, store) = open_temp();
        let mut record = game("g1", "user-1");
        store.save_game(record.clone()).await.unwrap();

        record.completed = true;
        store.save_game(record.clone()).await.unwrap();

        let fetched = store.fetch_game("g1".into()).await.unwrap().unwrap();
        assert!(fetched.completed);
    }

    #[tokio::test]
    async fn save_games_commits_every_record() {
        let (_dir, store) = open_temp();
        let games = vec![game("a", "u"), game("b", "u"), game("c", "u")];

        store.save_games(games.clone()).await.unwrap();

        let fetched = store
            .fetch_games(vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(ids(&fetched), ids(&games));
    }

    #[tokio::test]
    async fn failed_save_games_writes_nothing() {
        let (_dir, store) = open_temp();

        let err = store
            .save_games(vec![game("a", "u"), game("b", "u"), game("", "u")])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Encoding { .. }));
        assert_eq!(store.fetch_game("a".into()).await.unwrap(), None);
        assert!(
            store
                .fetch_games(vec!["a".into(), "b".into()])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn fetch_games_filters_by_membership() {
        let (_dir, store) = open_temp();
        store
            .save_games(vec![game("a", "u"), game("b", "u"), game("c", "u")])
            .await
            .unwrap();

        let fetched = store
            .fetch_games(vec!["c".into(), "a".into(), "zzz".into()])
            .await
            .unwrap();
        assert_eq!(ids(&fetched), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn empty_batches_are_trivial() {
        let (_dir, store) = open_temp();
        store.save_games(Vec::new()).await.unwrap();
        assert!(store.fetch_games(Vec::new()).await.unwrap().is_empty());
        assert!(store.delete_games(Vec::new()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, store) = open_temp();
        store.save_game(game("g1", "u")).await.unwrap();

        assert!(store.delete_game("g1".into()).await.unwrap());
        assert_eq!(store.fetch_game("g1".into()).await.unwrap(), None);
        assert!(!store.delete_game("g1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_games_ands_individual_results() {
        let (_dir, store) = open_temp();
        store
            .save_games(vec![game("a", "u"), game("b", "u"), game("c", "u")])
            .await
            .unwrap();

        assert!(
            store
                .delete_games(vec!["a".into(), "b".into()])
                .await
                .unwrap()
        );
        assert!(
            !store
                .delete_games(vec!["c".into(), "missing".into()])
                .await
                .unwrap()
        );
        assert!(
            store
                .fetch_games(vec!["a".into(), "b".into(), "c".into()])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn guest_game_is_returned_only_when_orphaned() {
        let (_dir, store) = open_temp();
        store.save_game(game("hosted", "user-1")).await.unwrap();
        assert_eq!(store.fetch_guest_game().await.unwrap(), None);

        let guest = game("guest-game", "guest-1234");
        store.save_game(guest.clone()).await.unwrap();
        store
            .save_user(UserEntity::new("user-1", "Ada"))
            .await
            .unwrap();
        assert_eq!(store.fetch_guest_game().await.unwrap(), Some(guest));

        let mut owner = UserEntity::new("user-2", "Grace");
        owner.game_ids.insert("guest-game".into());
        store.save_user(owner).await.unwrap();
        assert_eq!(store.fetch_guest_game().await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_guest_game_ignores_references() {
        let (_dir, store) = open_temp();
        store.save_game(game("guest-game", "guest")).await.unwrap();
        store.save_game(game("hosted", "user-1")).await.unwrap();
        let mut owner = UserEntity::new("user-1", "Ada");
        owner.game_ids.insert("guest-game".into());
        store.save_user(owner).await.unwrap();

        assert!(store.delete_guest_game().await.unwrap());
        assert!(!store.delete_guest_game().await.unwrap());
        assert!(store.fetch_game("hosted".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn users_round_trip() {
        let (_dir, store) = open_temp();
        let mut user = UserEntity::new("user-1", "Ada");
        user.game_ids.insert("g1".into());
        store.save_user(user.clone()).await.unwrap();

        assert_eq!(
            store.fetch_user("user-1".into()).await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(store.fetch_users().await.unwrap(), vec![user]);
        assert_eq!(store.fetch_user("nobody".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn trait_object_behaves_like_inherent_api() {
        let (_dir, store) = open_temp();
        let store: Arc<dyn GameStore> = Arc::new(store);

        store.health_check().await.unwrap();
        store.save(game("g1", "u")).await.unwrap();
        assert!(store.fetch("g1".into()).await.unwrap().is_some());
        assert!(store.delete_all(vec!["g1".into()]).await.unwrap());
    }

    #[tokio::test]
    async fn reopening_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.redb");
        {
            let store = LocalGameStore::open(&path).unwrap();
            store.save_game(game("g1", "u")).await.unwrap();
        }
        let store = LocalGameStore::open(&path).unwrap();
        assert!(store.fetch_game("g1".into()).await.unwrap().is_some());
    }
}
