use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
};
use tracing::info;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{game_from_document, id_filter, ids_filter, merge_update},
};
use crate::{
    dao::{game_store::remote::DocumentCollection, storage::StorageResult},
    dto::game::GameDto,
};

/// Game documents stored in one MongoDB collection, keyed by `_id`.
#[derive(Clone)]
pub struct MongoGameCollection {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: Database,
    collection_name: String,
}

impl MongoGameCollection {
    /// Build the client and make sure the server answers a ping.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let client = Client::with_options(config.options)
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&config.database_name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::InitialPing {
                database: config.database_name.clone(),
                source,
            })?;

        info!(
            database = %config.database_name,
            collection = %config.collection_name,
            "connected to MongoDB"
        );

        Ok(Self {
            inner: Arc::new(MongoInner {
                database,
                collection_name: config.collection_name,
            }),
        })
    }

    fn collection(&self) -> Collection<Document> {
        self.inner
            .database
            .collection::<Document>(&self.inner.collection_name)
    }

    async fn load(&self, id: &str) -> MongoResult<Option<GameDto>> {
        let document = self
            .collection()
            .find_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                id: id.to_owned(),
                source,
            })?;
        document.map(game_from_document).transpose()
    }

    async fn merge(&self, dto: GameDto) -> MongoResult<()> {
        let update = merge_update(&dto)?;
        self.collection()
            .update_one(id_filter(&dto.id), update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: dto.id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> MongoResult<bool> {
        let result = self
            .collection()
            .delete_one(id_filter(id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: id.to_owned(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn remove_all(&self, ids: Vec<String>) -> MongoResult<()> {
        let count = ids.len();
        self.collection()
            .delete_many(ids_filter(&ids))
            .await
            .map_err(|source| MongoDaoError::DeleteGames { count, source })?;
        Ok(())
    }

    async fn query(&self, ids: Vec<String>) -> MongoResult<Vec<GameDto>> {
        let count = ids.len();
        let documents: Vec<Document> = self
            .collection()
            .find(ids_filter(&ids))
            .await
            .map_err(|source| MongoDaoError::QueryGames { count, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryGames { count, source })?;

        documents.into_iter().map(game_from_document).collect()
    }

    async fn ping(&self) -> MongoResult<()> {
        self.inner
            .database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl DocumentCollection for MongoGameCollection {
    fn get(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameDto>>> {
        let collection = self.clone();
        Box::pin(async move { collection.load(&id).await.map_err(Into::into) })
    }

    fn set_merge(&self, dto: GameDto) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.clone();
        Box::pin(async move { collection.merge(dto).await.map_err(Into::into) })
    }

    fn delete(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let collection = self.clone();
        Box::pin(async move { collection.remove(&id).await.map_err(Into::into) })
    }

    fn batch_delete(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.clone();
        Box::pin(async move { collection.remove_all(ids).await.map_err(Into::into) })
    }

    fn query_in(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<Vec<GameDto>>> {
        let collection = self.clone();
        Box::pin(async move { collection.query(ids).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.clone();
        Box::pin(async move { collection.ping().await.map_err(Into::into) })
    }
}
