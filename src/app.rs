//! App Core for bookdash.
//!
//! Central struct holding the database, the icon store and the services built
//! on top of them.

use std::sync::Arc;

use tracing::info;

use crate::database::connection::Database;
use crate::services::backup_service::BackupService;
use crate::services::favicon_service::{FaviconFetcher, FaviconService, HttpFaviconFetcher};
use crate::services::icon_store::IconStore;
use crate::types::config::ServerConfig;

/// Central application struct.
///
/// Managers are not stored here because they borrow `&Connection` with a
/// lifetime. Create them on demand from `db.connection()`.
pub struct App {
    pub config: ServerConfig,
    pub db: Arc<Database>,
    pub icons: Arc<IconStore>,
    pub favicons: Arc<FaviconService>,
    pub backups: BackupService,
}

impl App {
    /// Opens the database at `config.database_path()` and fetches favicons over HTTP.
    pub fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let fetcher = HttpFaviconFetcher::from_config(&config)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Like [`App::new`], with a caller-supplied favicon fetcher.
    pub fn with_fetcher(
        config: ServerConfig,
        fetcher: Arc<dyn FaviconFetcher>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open(config.database_path())?;
        Ok(Self::with_database(config, db, fetcher))
    }

    /// Wires services around an already opened database.
    pub fn with_database(config: ServerConfig, db: Database, fetcher: Arc<dyn FaviconFetcher>) -> Self {
        let db = Arc::new(db);
        let icons = Arc::new(IconStore::from_config(&config));
        let favicons = Arc::new(FaviconService::new(
            db.clone(),
            icons.clone(),
            fetcher,
            &config.public_upload_prefix,
        ));
        let backups = BackupService::new(db.clone(), icons.clone(), favicons.clone());

        Self {
            config,
            db,
            icons,
            favicons,
            backups,
        }
    }

    /// Creates the icon directories.
    pub fn startup(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(self.icons.legacy_dir())?;
        std::fs::create_dir_all(self.icons.spaces_dir())?;
        info!(
            database = %self.config.database_path().display(),
            uploads = %self.icons.root().display(),
            "bookdash ready"
        );
        Ok(())
    }
}
