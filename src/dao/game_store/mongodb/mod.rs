mod collection;
mod config;
mod error;
mod models;

pub use collection::MongoGameCollection;
pub use config::MongoConfig;
pub use error::MongoDaoError;
