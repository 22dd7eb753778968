use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration, persisted as JSON by `ConfigEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,
    /// Database file name inside `data_dir`.
    pub database_file: String,
    /// Root of the icon file store.
    pub upload_dir: String,
    /// URL prefix under which `upload_dir` is served.
    pub public_upload_prefix: String,
    /// Per-request timeout for favicon fetches.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Initial value of the registration flag for users without settings.
    pub allow_registration_default: bool,
    pub max_icon_upload_bytes: u64,
    pub rate_limit_per_second: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            database_file: "bookdash.db".to_string(),
            upload_dir: "uploads".to_string(),
            public_upload_prefix: "/uploads".to_string(),
            fetch_timeout_secs: 5,
            user_agent: concat!("bookdash/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_registration_default: false,
            max_icon_upload_bytes: 5 * 1024 * 1024,
            rate_limit_per_second: 200,
        }
    }
}

impl ServerConfig {
    /// Full path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.database_file)
    }
}
