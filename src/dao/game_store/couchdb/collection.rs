use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::{
    dao::{game_store::remote::DocumentCollection, storage::StorageResult},
    dto::game::GameDto,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        ALL_DOCS, AllDocsResponse, BULK_DOCS, BulkDocsRequest, BulkDocsRow, CouchGameDocument,
        KeysRequest, deletions,
    },
};

/// Game documents stored in a CouchDB database, one document per game id.
#[derive(Clone)]
pub struct CouchGameCollection {
    client: Client,
    database_url: Url,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameCollection {
    /// Build the HTTP client and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let collection = Self {
            client,
            database_url: config.database_url()?,
            auth: config
                .username
                .zip(config.password)
                .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p))),
        };

        collection.ensure_database(&config.database).await?;
        info!(database = %config.database, "connected to CouchDB");
        Ok(collection)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    /// `segment` is percent-encoded as a single path segment below the database.
    fn document_url(&self, segment: &str) -> CouchResult<Url> {
        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|()| CouchDaoError::InvalidUrl {
                url: self.database_url.to_string(),
                reason: "cannot hold a path".into(),
            })?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn request(&self, method: Method, segment: &str) -> CouchResult<RequestBuilder> {
        let url = self.document_url(segment)?;
        Ok(self.authorized(self.client.request(method, url)))
    }

    /// Ids starting with `_` address CouchDB system endpoints, not documents.
    fn document_request(&self, method: Method, id: &str) -> CouchResult<RequestBuilder> {
        if id.starts_with('_') {
            return Err(CouchDaoError::ReservedId { id: id.to_owned() });
        }
        self.request(method, id)
    }

    async fn ensure_database(&self, database: &str) -> CouchResult<()> {
        let url = self.database_url.clone();
        let response = self
            .authorized(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.to_owned(),
                        source,
                    })?;
                // 412: created concurrently by someone else.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    info!(database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database: database.to_owned(),
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database: database.to_owned(),
                status: other,
            }),
        }
    }

    async fn send_json<T>(&self, path: &str, builder: RequestBuilder) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_owned(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: path.to_owned(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_owned(),
                source,
            })
    }

    async fn get_document(&self, id: &str) -> CouchResult<Option<CouchGameDocument>> {
        let response = self
            .document_request(Method::GET, id)?
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: id.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json::<serde_json::Value>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: id.to_owned(),
                        source,
                    }
                })?;
                CouchGameDocument::from_row(id, value).map(Some)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: id.to_owned(),
                status: other,
            }),
        }
    }

    async fn merge(&self, dto: GameDto) -> CouchResult<()> {
        let existing = self.get_document(&dto.id).await?;
        let document = CouchGameDocument::merged(existing, &dto)?;

        let response = self
            .document_request(Method::PUT, &dto.id)?
            .json(&document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: dto.id.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: dto.id,
                status: response.status(),
            })
        }
    }

    async fn remove(&self, id: &str) -> CouchResult<bool> {
        let Some(rev) = self.get_document(id).await?.and_then(|doc| doc.rev) else {
            return Ok(false);
        };

        let response = self
            .document_request(Method::DELETE, id)?
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: id.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: id.to_owned(),
                status: other,
            }),
        }
    }

    async fn all_docs(&self, ids: &[String], include_docs: bool) -> CouchResult<AllDocsResponse> {
        let builder = self
            .request(Method::POST, ALL_DOCS)?
            .query(&[("include_docs", include_docs)])
            .json(&KeysRequest { keys: ids });
        self.send_json(ALL_DOCS, builder).await
    }

    async fn query(&self, ids: Vec<String>) -> CouchResult<Vec<GameDto>> {
        let response = self.all_docs(&ids, true).await?;
        response
            .rows
            .into_iter()
            .filter_map(|row| {
                let doc = row.doc?;
                Some(CouchGameDocument::from_row(&row.key, doc).and_then(CouchGameDocument::into_dto))
            })
            .collect()
    }

    /// Not atomic: CouchDB applies each tombstone on its own.
    async fn remove_all(&self, ids: Vec<String>) -> CouchResult<()> {
        let docs = deletions(self.all_docs(&ids, false).await?.rows);
        if docs.is_empty() {
            return Ok(());
        }

        let builder = self
            .request(Method::POST, BULK_DOCS)?
            .json(&BulkDocsRequest { docs });
        let rows: Vec<BulkDocsRow> = self.send_json(BULK_DOCS, builder).await?;

        let failed: Vec<String> = rows
            .into_iter()
            .filter(|row| row.error.is_some())
            .map(|row| row.id)
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CouchDaoError::BulkRejected { failed })
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let url = self.database_url.to_string();
        let response = self
            .authorized(self.client.get(self.database_url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

impl DocumentCollection for CouchGameCollection {
    fn get(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameDto>>> {
        let collection = self.clone();
        Box::pin(async move {
            let document = collection.get_document(&id).await?;
            document
                .map(CouchGameDocument::into_dto)
                .transpose()
                .map_err(Into::into)
        })
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

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::Mutex,
        time::{Duration, UNIX_EPOCH},
    };

    use serde_json::{Value, json};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;
    use crate::dao::storage::StorageError;

    /// Request line and body of every request the stub answered, in order.
    type Recorded = Arc<Mutex<Vec<(String, String)>>>;

    /// Minimal HTTP/1.1 server answering one scripted response per connection.
    async fn stub_server(responses: Vec<(u16, String)>) -> (SocketAddr, Recorded) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Recorded::default();
        let log = recorded.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (addr, recorded)
    }

    async fn read_request(socket: &mut TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "client closed the connection mid-request");
            buf.extend_from_slice(&chunk[..read]);
            if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let read = socket.read(&mut chunk).await.unwrap();
            assert!(read > 0, "client closed the connection mid-body");
            buf.extend_from_slice(&chunk[..read]);
        }

        let line = head.lines().next().unwrap_or_default().to_owned();
        let body = String::from_utf8_lossy(&buf[header_end..header_end + length]).into_owned();
        (line, body)
    }

    /// Connects against the stub; the first scripted response answers the database check.
    async fn connect(responses: Vec<(u16, Value)>) -> (CouchGameCollection, Recorded) {
        let mut script = vec![(200, "{}".to_owned())];
        script.extend(responses.into_iter().map(|(status, body)| (status, body.to_string())));
        let (addr, recorded) = stub_server(script).await;

        let collection = CouchGameCollection::connect(CouchConfig::new(format!("http://{addr}"), "db"))
            .await
            .unwrap();
        assert_eq!(recorded.lock().unwrap()[0].0, "GET /db HTTP/1.1");
        (collection, recorded)
    }

    fn request_line(recorded: &Recorded, index: usize) -> String {
        recorded.lock().unwrap()[index].0.clone()
    }

    fn not_found() -> (u16, Value) {
        (404, json!({ "error": "not_found", "reason": "missing" }))
    }

    fn dto() -> GameDto {
        GameDto {
            id: "g1".into(),
            host_user_id: "user-1".into(),
            course_id: None,
            location_name: None,
            number_of_holes: 9,
            players: Vec::new(),
            started_at: UNIX_EPOCH + Duration::from_millis(1_700_000_000_000),
            completed: true,
        }
    }

    #[tokio::test]
    async fn missing_document_is_none_and_ids_are_escaped() {
        let (collection, recorded) = connect(vec![not_found(), not_found()]).await;

        assert_eq!(collection.get("round#1?x=y".into()).await.unwrap(), None);
        assert_eq!(collection.get("a/b".into()).await.unwrap(), None);

        assert_eq!(request_line(&recorded, 1), "GET /db/round%231%3Fx=y HTTP/1.1");
        assert_eq!(request_line(&recorded, 2), "GET /db/a%2Fb HTTP/1.1");
    }

    #[tokio::test]
    async fn merge_puts_the_stored_revision_back() {
        let stored = json!({
            "_id": "g1",
            "_rev": "1-abc",
            "hostUserId": "user-1",
            "locationName": "Harbor Mini Golf",
            "numberOfHoles": 9,
            "players": [],
            "startedAt": 1_700_000_000_000_i64,
            "completed": false
        });
        let (collection, recorded) = connect(vec![
            (200, stored),
            (201, json!({ "ok": true, "id": "g1", "rev": "2-def" })),
        ])
        .await;

        collection.set_merge(dto()).await.unwrap();

        assert_eq!(request_line(&recorded, 1), "GET /db/g1 HTTP/1.1");
        assert_eq!(request_line(&recorded, 2), "PUT /db/g1 HTTP/1.1");
        let body: Value = serde_json::from_str(&recorded.lock().unwrap()[2].1).unwrap();
        assert_eq!(body["_id"], "g1");
        assert_eq!(body["_rev"], "1-abc");
        assert_eq!(body["completed"], true);
        assert_eq!(body["locationName"], "Harbor Mini Golf");
        assert!(body.get("id").is_none());
    }

    #[tokio::test]
    async fn delete_sends_the_current_revision() {
        let (collection, recorded) = connect(vec![
            (200, json!({ "_id": "g1", "_rev": "3-x" })),
            (200, json!({ "ok": true, "id": "g1", "rev": "4-y" })),
        ])
        .await;

        assert!(collection.delete("g1".into()).await.unwrap());
        assert_eq!(request_line(&recorded, 2), "DELETE /db/g1?rev=3-x HTTP/1.1");
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_false() {
        let (collection, recorded) = connect(vec![not_found()]).await;

        assert!(!collection.delete("g1".into()).await.unwrap());
        assert_eq!(recorded.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refused_tombstones_are_reported() {
        let (collection, recorded) = connect(vec![
            (
                200,
                json!({ "rows": [
                    { "key": "a", "id": "a", "value": { "rev": "1-a" } },
                    { "key": "b", "id": "b", "value": { "rev": "1-b" } },
                    { "key": "c", "error": "not_found" }
                ] }),
            ),
            (
                201,
                json!([
                    { "id": "a", "error": "conflict", "reason": "Document update conflict." },
                    { "id": "b", "ok": true, "rev": "2-b" }
                ]),
            ),
        ])
        .await;

        let err = collection
            .remove_all(vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, CouchDaoError::BulkRejected { ref failed } if failed == &["a"]));
        assert_eq!(
            request_line(&recorded, 1),
            "POST /db/_all_docs?include_docs=false HTTP/1.1"
        );
        assert_eq!(request_line(&recorded, 2), "POST /db/_bulk_docs HTTP/1.1");
        let body: Value = serde_json::from_str(&recorded.lock().unwrap()[2].1).unwrap();
        assert_eq!(body["docs"].as_array().unwrap().len(), 2);
        assert_eq!(body["docs"][0]["_deleted"], true);
    }

    #[tokio::test]
    async fn reserved_ids_never_reach_the_server() {
        let (collection, recorded) = connect(Vec::new()).await;

        let err = collection.get("_design/games".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { ref id, .. } if id == "_design/games"));

        let mut reserved = dto();
        reserved.id = "_all_docs".into();
        let err = collection.set_merge(reserved).await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { .. }));

        let err = collection.delete("_users".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::Encoding { .. }));

        assert_eq!(recorded.lock().unwrap().len(), 1);
    }
}
