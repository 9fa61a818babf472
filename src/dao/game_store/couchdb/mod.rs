mod collection;
mod config;
mod error;
mod models;

pub use collection::CouchGameCollection;
pub use config::CouchConfig;
pub use error::CouchDaoError;
