use mongodb::bson::{Document, doc};

use crate::dto::game::GameDto;

use super::error::{MongoDaoError, MongoResult};

/// Field holding the game id on every stored document.
const ID_FIELD: &str = "_id";

pub fn id_filter(id: &str) -> Document {
    doc! { ID_FIELD: id }
}

pub fn ids_filter(ids: &[String]) -> Document {
    doc! { ID_FIELD: { "$in": ids.to_vec() } }
}

/// Build a `$set` update so that fields absent from the DTO keep their stored value.
pub fn merge_update(dto: &GameDto) -> MongoResult<Document> {
    let mut fields =
        mongodb::bson::to_document(dto).map_err(|source| MongoDaoError::EncodeGame {
            id: dto.id.clone(),
            source,
        })?;
    // The key lives in `_id`; the upsert filter sets it on insert.
    fields.remove("id");
    Ok(doc! { "$set": fields })
}

/// Turn a stored document back into a DTO, moving `_id` into the `id` field.
pub fn game_from_document(mut document: Document) -> MongoResult<GameDto> {
    let id = document.get_str(ID_FIELD).unwrap_or_default().to_owned();
    document.remove(ID_FIELD);
    document.insert("id", id.clone());
    mongodb::bson::from_document(document).map_err(|source| MongoDaoError::DecodeGame { id, source })
}
