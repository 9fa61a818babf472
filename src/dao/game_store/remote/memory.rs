//! In-process document collection used for dry runs and tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use dashmap::{DashMap, DashSet};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    dao::storage::{StorageError, StorageResult},
    dto::game::GameDto,
};

use super::collection::{DocumentCollection, MEMBERSHIP_QUERY_LIMIT};

/// Failures raised by [`MemoryGameCollection`].
#[derive(Debug, Error)]
pub enum MemoryCollectionError {
    /// A membership query carried more keys than a real backend accepts.
    #[error("membership query with {requested} keys exceeds the limit of {MEMBERSHIP_QUERY_LIMIT}")]
    QueryLimit {
        /// Keys in the refused query.
        requested: usize,
    },
    /// The document was configured to reject requests.
    #[error("request for document `{id}` rejected")]
    Rejected {
        /// Document key.
        id: String,
    },
    /// The DTO could not be turned into a JSON object.
    #[error("failed to encode document `{id}`")]
    Encode {
        /// Document key.
        id: String,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored JSON object does not match the DTO shape.
    #[error("failed to decode document `{id}`")]
    Decode {
        /// Document key.
        id: String,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
}

impl From<MemoryCollectionError> for StorageError {
    fn from(err: MemoryCollectionError) -> Self {
        match &err {
            MemoryCollectionError::Encode { id, .. } => {
                let id = id.clone();
                StorageError::encoding(id, err)
            }
            MemoryCollectionError::Decode { id, .. } => {
                let id = id.clone();
                StorageError::decoding(id, err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}

/// Document collection held in a concurrent map, one JSON object per game id.
#[derive(Clone, Default)]
pub struct MemoryGameCollection {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    documents: DashMap<String, Map<String, Value>>,
    rejected_ids: DashSet<String>,
    queries: AtomicUsize,
    batch_deletes: AtomicUsize,
}

impl MemoryGameCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.documents.len()
    }

    /// Whether the collection holds no document.
    pub fn is_empty(&self) -> bool {
        self.inner.documents.is_empty()
    }

    fn check_rejected<'a>(
        &self,
        mut ids: impl Iterator<Item = &'a String>,
    ) -> Result<(), MemoryCollectionError> {
        match ids.find(|id| self.inner.rejected_ids.contains(*id)) {
            Some(id) => Err(MemoryCollectionError::Rejected { id: id.clone() }),
            None => Ok(()),
        }
    }

    fn merge(&self, dto: GameDto) -> Result<(), MemoryCollectionError> {
        let id = dto.id.clone();
        self.check_rejected(std::iter::once(&id))?;

        let fields = serde_json::to_value(&dto)
            .and_then(serde_json::from_value::<Map<String, Value>>)
            .map_err(|source| MemoryCollectionError::Encode {
                id: id.clone(),
                source,
            })?;
        self.inner.documents.entry(id).or_default().extend(fields);
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Option<GameDto>, MemoryCollectionError> {
        let Some(fields) = self.inner.documents.get(id).map(|doc| doc.value().clone()) else {
            return Ok(None);
        };
        decode(id, fields).map(Some)
    }

    fn query(&self, ids: Vec<String>) -> Result<Vec<GameDto>, MemoryCollectionError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        if ids.len() > MEMBERSHIP_QUERY_LIMIT {
            return Err(MemoryCollectionError::QueryLimit {
                requested: ids.len(),
            });
        }
        self.check_rejected(ids.iter())?;

        let mut found: Vec<(String, Map<String, Value>)> = ids
            .into_iter()
            .filter_map(|id| {
                let fields = self.inner.documents.get(&id)?.value().clone();
                Some((id, fields))
            })
            .collect();
        // Results come back in key order, like an indexed backend.
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found.dedup_by(|a, b| a.0 == b.0);

        found
            .into_iter()
            .map(|(id, fields)| decode(&id, fields))
            .collect()
    }

    fn remove_all(&self, ids: Vec<String>) -> Result<(), MemoryCollectionError> {
        self.inner.batch_deletes.fetch_add(1, Ordering::SeqCst);
        self.check_rejected(ids.iter())?;
        for id in ids {
            self.inner.documents.remove(&id);
        }
        Ok(())
    }

    /// Store a raw JSON object under `id`, bypassing the DTO encoding.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, id: &str, fields: Value) {
        if let Value::Object(fields) = fields {
            self.inner.documents.insert(id.to_owned(), fields);
        }
    }

    /// Make every request touching `id` fail.
    #[cfg(test)]
    pub(crate) fn reject_requests_for(&self, id: &str) {
        self.inner.rejected_ids.insert(id.to_owned());
    }

    /// Number of membership queries issued so far.
    #[cfg(test)]
    pub(crate) fn query_count(&self) -> usize {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Number of batch delete requests issued so far.
    #[cfg(test)]
    pub(crate) fn batch_delete_count(&self) -> usize {
        self.inner.batch_deletes.load(Ordering::SeqCst)
    }
}

fn decode(id: &str, fields: Map<String, Value>) -> Result<GameDto, MemoryCollectionError> {
    serde_json::from_value(Value::Object(fields)).map_err(|source| MemoryCollectionError::Decode {
        id: id.to_owned(),
        source,
    })
}

impl DocumentCollection for MemoryGameCollection {
    fn get(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameDto>>> {
        let collection = self.clone();
        Box::pin(async move { collection.read(&id).map_err(Into::into) })
    }

    fn set_merge(&self, dto: GameDto) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.clone();
        Box::pin(async move { collection.merge(dto).map_err(Into::into) })
    }

    fn delete(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let collection = self.clone();
        Box::pin(async move {
            collection.check_rejected(std::iter::once(&id))?;
            Ok(collection.inner.documents.remove(&id).is_some())
        })
    }

    fn batch_delete(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.clone();
        Box::pin(async move { collection.remove_all(ids).map_err(Into::into) })
    }

    fn query_in(&self, ids: Vec<String>) -> BoxFuture<'static, StorageResult<Vec<GameDto>>> {
        let collection = self.clone();
        Box::pin(async move { collection.query(ids).map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
