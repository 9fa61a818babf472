use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dto::game::GameDto;

use super::error::{CouchDaoError, CouchResult};

pub const ALL_DOCS: &str = "_all_docs";
pub const BULK_DOCS: &str = "_bulk_docs";

/// Body of a keyed `_all_docs` request.
#[derive(Debug, Serialize)]
pub struct KeysRequest<'a> {
    pub keys: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

/// Unknown keys come back as rows with an `error` and no `value`.
#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub key: String,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

/// A stored game: CouchDB bookkeeping plus every DTO field except `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CouchGameDocument {
    /// Lay `dto` over `existing`: fields the DTO carries win, the rest are kept.
    pub fn merged(existing: Option<CouchGameDocument>, dto: &GameDto) -> CouchResult<Self> {
        let mut incoming = serde_json::to_value(dto)
            .and_then(serde_json::from_value::<Map<String, Value>>)
            .map_err(|source| CouchDaoError::EncodeDocument {
                id: dto.id.clone(),
                source,
            })?;
        incoming.remove("id");

        let (rev, mut fields) = match existing {
            Some(doc) => (doc.rev, doc.fields),
            None => (None, Map::new()),
        };
        fields.extend(incoming);

        Ok(Self {
            id: dto.id.clone(),
            rev,
            fields,
        })
    }

    pub fn into_dto(self) -> CouchResult<GameDto> {
        let Self { id, mut fields, .. } = self;
        fields.insert("id".to_owned(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|source| CouchDaoError::DecodeDocument { id, source })
    }

    pub fn from_row(key: &str, doc: Value) -> CouchResult<Self> {
        serde_json::from_value(doc).map_err(|source| CouchDaoError::DecodeDocument {
            id: key.to_owned(),
            source,
        })
    }
}

/// Tombstone sent through `_bulk_docs`.
#[derive(Debug, Serialize)]
pub struct Deletion {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<Deletion>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsRow {
    pub id: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Tombstones for every row that still points at a live revision.
pub fn deletions(rows: Vec<AllDocsRow>) -> Vec<Deletion> {
    rows.into_iter()
        .filter_map(|row| {
            let value = row.value.filter(|value| !value.deleted)?;
            Some(Deletion {
                id: row.key,
                rev: value.rev,
                deleted: true,
            })
        })
        .collect()
}
