use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "minimate";
const DEFAULT_COLLECTION: &str = "games";

/// Connection options and the collection holding the game documents.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database name, `minimate` unless overridden.
    pub database_name: String,
    /// Collection name, `games` unless overridden.
    pub collection_name: String,
}

impl MongoConfig {
    /// Parse `uri`; `db_name` defaults to `minimate`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            collection_name: DEFAULT_COLLECTION.to_owned(),
        })
    }

    /// `MONGO_URI` is required; `MONGO_DB` and `MONGO_COLLECTION` are optional.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, db.as_deref()).await?;
        if let Ok(collection) = std::env::var("MONGO_COLLECTION") {
            config.collection_name = collection;
        }
        Ok(config)
    }
}
