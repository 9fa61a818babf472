//! Application-level configuration loading: where the local database lives and which
//! remote backend to talk to.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::game_store::remote::{DEFAULT_DELETE_BATCH_LIMIT, RemoteBackend};

/// Default location on disk where the binary looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/minimate.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MINIMATE_CONFIG_PATH";
const DEFAULT_LOCAL_DB_PATH: &str = "data/minimate.redb";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration.
pub struct AppConfig {
    /// redb file holding the on-device games and users.
    pub local_db_path: PathBuf,
    /// Document collection behind the remote store.
    pub remote_backend: RemoteBackend,
    /// Ceiling on ids per remote batch delete request.
    pub delete_batch_limit: usize,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`; a missing or malformed file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        backend = %config.remote_backend,
                        local_db = %config.local_db_path.display(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            local_db_path: PathBuf::from(DEFAULT_LOCAL_DB_PATH),
            remote_backend: RemoteBackend::default(),
            delete_batch_limit: DEFAULT_DELETE_BATCH_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file; every key is optional.
struct RawConfig {
    local_db_path: Option<PathBuf>,
    remote_backend: Option<RemoteBackend>,
    delete_batch_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            local_db_path: value.local_db_path.unwrap_or(defaults.local_db_path),
            remote_backend: value.remote_backend.unwrap_or(defaults.remote_backend),
            delete_batch_limit: value
                .delete_batch_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.delete_batch_limit),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
