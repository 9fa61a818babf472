use reqwest::Url;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "minimate";

/// Where the CouchDB game documents live and how to authenticate.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, without a trailing slash.
    pub base_url: String,
    /// Database holding one document per game.
    pub database: String,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Anonymous access to `database` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `COUCH_BASE_URL` is required; `COUCH_DB` defaults to `minimate`.
    /// Credentials are only used when both `COUCH_USERNAME` and `COUCH_PASSWORD` are set.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database =
            std::env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());

        let config = Self::new(base_url, database);
        match (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Ok(config.with_credentials(username, password)),
            _ => Ok(config),
        }
    }

    /// Database endpoint, with the database name encoded as one path segment.
    pub(super) fn database_url(&self) -> CouchResult<Url> {
        let invalid = |reason: String| CouchDaoError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot hold a path".into()))?
            .pop_if_empty()
            .push(&self.database);
        Ok(url)
    }
}
