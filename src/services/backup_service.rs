//! Backup Service for bookdash.
//!
//! Exports a user's spaces, categories, bookmarks and settings together with
//! the hierarchical icon tree as a ZIP archive, and restores such an archive
//! in place of the user's current data.
//!
//! Restore rewrites every identifier: rows are inserted parent-first and the
//! old→new id maps built along the way are used to rewrite child references.
//! The wipe and the re-insert share one SQLite transaction.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::database::Database;
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use crate::managers::category_manager::{CategoryManager, CategoryManagerTrait};
use crate::managers::settings_manager::{SettingsManager, SettingsManagerTrait};
use crate::managers::space_manager::{SpaceManager, SpaceManagerTrait};
use crate::services::favicon_service::FaviconService;
use crate::services::icon_store::IconStore;
use crate::types::backup::{
    ArchiveEntry, BackupArchive, BackupPayload, RepairStrategy, RestoreOptions, RestoreReport,
    DATA_ENTRY, LEGACY_ICONS_PREFIX, SPACES_PREFIX,
};
use crate::types::errors::BackupError;
use crate::types::favicon::ResolvedIcon;

/// Content type of the exported archive.
pub const BACKUP_CONTENT_TYPE: &str = "application/zip";
/// Suggested download name of the exported archive.
pub const BACKUP_FILENAME: &str = "bookdash-backup.zip";

fn archive_err(e: zip::result::ZipError) -> BackupError {
    BackupError::ArchiveError(e.to_string())
}

fn io_err(e: std::io::Error) -> BackupError {
    BackupError::FileSystemError(e.to_string())
}

fn db_err(e: rusqlite::Error) -> BackupError {
    BackupError::DatabaseError(e.to_string())
}

/// Resolves a parent reference through an id map according to `repair`.
///
/// `Ok(None)` means the row should be dropped.
fn remap(
    map: &HashMap<String, String>,
    original: &str,
    repair: RepairStrategy,
    what: &str,
) -> Result<Option<String>, BackupError> {
    if let Some(new_id) = map.get(original) {
        return Ok(Some(new_id.clone()));
    }
    match repair {
        RepairStrategy::Drop => Ok(None),
        RepairStrategy::KeepDangling => Ok(Some(original.to_string())),
        RepairStrategy::Fail => Err(BackupError::UnresolvedReference(format!(
            "{} {} is not in the backup",
            what, original
        ))),
    }
}

/// Serializes `payload` and the icon tree into a ZIP. Returns the bytes and the
/// number of icon files written.
fn write_archive(payload: &BackupPayload, icons: &IconStore) -> Result<(Vec<u8>, usize), BackupError> {
    let json = serde_json::to_vec_pretty(payload).map_err(|e| BackupError::ArchiveError(e.to_string()))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(DATA_ENTRY, options).map_err(archive_err)?;
    writer.write_all(&json).map_err(io_err)?;

    let files = match icons.collect_space_files() {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "icon directory unreadable, exporting data only");
            Vec::new()
        }
    };

    let mut icon_count = 0usize;
    for (name, path) in files {
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable icon");
                continue;
            }
        };
        writer.start_file(name.as_str(), options).map_err(archive_err)?;
        writer.write_all(&data).map_err(io_err)?;
        icon_count += 1;
    }

    let bytes = writer.finish().map_err(archive_err)?.into_inner();
    Ok((bytes, icon_count))
}

/// Backup export and restore for one user at a time.
pub struct BackupService {
    db: Arc<Database>,
    icons: Arc<IconStore>,
    favicons: Arc<FaviconService>,
}

impl BackupService {
    pub fn new(db: Arc<Database>, icons: Arc<IconStore>, favicons: Arc<FaviconService>) -> Self {
        Self { db, icons, favicons }
    }

    /// Loads everything the user owns as stored, identifiers included. Read-only.
    ///
    /// Icon URLs are exported only when they were stored; the public URL the
    /// listings derive from `iconPath` is not written back.
    pub fn export_payload(&self, user_id: &str) -> Result<BackupPayload, BackupError> {
        let conn = self.db.connection();
        Ok(BackupPayload {
            spaces: SpaceManager::new(&conn).list_stored(user_id)?,
            categories: CategoryManager::new(&conn).list_stored(user_id)?,
            bookmarks: BookmarkManager::new(&conn).list_stored(user_id)?,
            settings: SettingsManager::new(&conn).find_settings(user_id)?,
        })
    }

    /// Builds the backup archive for `user_id`.
    ///
    /// The archive holds `data.json` plus every file under the icon store's
    /// `spaces/` tree. An unreadable or missing icon tree only costs the icon
    /// entries. The file walk and compression run on the blocking pool.
    pub async fn create_backup(&self, user_id: &str) -> Result<Vec<u8>, BackupError> {
        let payload = self.export_payload(user_id)?;
        let (spaces, categories, bookmarks) =
            (payload.spaces.len(), payload.categories.len(), payload.bookmarks.len());

        let icons = Arc::clone(&self.icons);
        let (bytes, icon_count) = tokio::task::spawn_blocking(move || write_archive(&payload, &icons))
            .await
            .map_err(|e| BackupError::ArchiveError(format!("backup task failed: {}", e)))??;

        info!(user_id, spaces, categories, bookmarks, icons = icon_count, size = bytes.len(), "backup created");
        Ok(bytes)
    }

    /// Reads and validates an archive without touching any state.
    ///
    /// # Errors
    /// `InvalidBackup` when the bytes are not a ZIP, `data.json` is missing,
    /// or its JSON does not have the expected shape.
    pub fn parse_archive(bytes: &[u8]) -> Result<BackupArchive, BackupError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| BackupError::InvalidBackup(format!("not a zip archive ({})", e)))?;

        let mut payload = None;
        let mut files = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(archive_err)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data).map_err(io_err)?;

            if name == DATA_ENTRY {
                let parsed: BackupPayload = serde_json::from_slice(&data).map_err(|e| {
                    BackupError::InvalidBackup(format!("failed to parse {}: {}", DATA_ENTRY, e))
                })?;
                payload = Some(parsed);
            } else {
                files.push(ArchiveEntry { name, data });
            }
        }

        let payload = payload
            .ok_or_else(|| BackupError::InvalidBackup(format!("{} not found", DATA_ENTRY)))?;
        Ok(BackupArchive { payload, files })
    }

    /// Replaces all of `user_id`'s data with the archive at `archive_path`.
    pub async fn restore_backup(
        &self,
        user_id: &str,
        archive_path: &Path,
        options: RestoreOptions,
    ) -> Result<RestoreReport, BackupError> {
        let bytes = tokio::fs::read(archive_path).await.map_err(|e| {
            BackupError::InvalidBackup(format!("cannot read {}: {}", archive_path.display(), e))
        })?;
        let archive = Self::parse_archive(&bytes)?;
        self.restore_archive(user_id, archive, options).await
    }

    /// Restores an already parsed archive.
    pub async fn restore_archive(
        &self,
        user_id: &str,
        archive: BackupArchive,
        options: RestoreOptions,
    ) -> Result<RestoreReport, BackupError> {
        info!(
            user_id,
            spaces = archive.payload.spaces.len(),
            categories = archive.payload.categories.len(),
            bookmarks = archive.payload.bookmarks.len(),
            files = archive.files.len(),
            repair = ?options.repair,
            "restoring backup"
        );

        let mut report = RestoreReport::default();
        self.replace_user_data(user_id, &archive.payload, options.repair, &mut report)?;
        self.extract_files(&archive.files, &mut report);
        self.refetch_missing_icons(user_id, &mut report).await?;

        info!(
            user_id,
            spaces = report.spaces,
            categories = report.categories,
            bookmarks = report.bookmarks,
            dropped = report.dropped,
            refetched = report.favicons_refetched,
            skipped = report.favicons_skipped,
            "restore finished"
        );
        Ok(report)
    }

    /// Wipes the user's rows and re-inserts the payload in one transaction.
    fn replace_user_data(
        &self,
        user_id: &str,
        payload: &BackupPayload,
        repair: RepairStrategy,
        report: &mut RestoreReport,
    ) -> Result<(), BackupError> {
        let mut conn = self.db.connection();
        let tx = conn.transaction().map_err(db_err)?;

        let mut spaces = SpaceManager::new(&tx);
        let mut categories = CategoryManager::new(&tx);
        let mut bookmarks = BookmarkManager::new(&tx);
        let mut settings = SettingsManager::new(&tx);

        let registration = match &payload.settings {
            Some(s) => Some(settings.registration_allowed(s.allow_registration)?),
            None => None,
        };

        bookmarks.delete_all_for_user(user_id)?;
        categories.delete_all_for_user(user_id)?;
        spaces.delete_all_for_user(user_id)?;
        settings.delete_for_user(user_id)?;

        let mut space_ids = HashMap::new();
        for space in &payload.spaces {
            let new_id = spaces.insert_restored(user_id, space)?;
            space_ids.insert(space.id.clone(), new_id);
            report.spaces += 1;
        }

        let mut category_ids = HashMap::new();
        for category in &payload.categories {
            let Some(space_id) = remap(&space_ids, &category.space_id, repair, "space")? else {
                debug!(category = %category.id, space = %category.space_id, "dropping orphaned category");
                report.dropped += 1;
                continue;
            };
            let new_id = categories.insert_restored(user_id, &space_id, category)?;
            category_ids.insert(category.id.clone(), new_id);
            report.categories += 1;
        }

        for bookmark in &payload.bookmarks {
            let space_id = remap(&space_ids, &bookmark.space_id, repair, "space")?;
            let category_id = remap(&category_ids, &bookmark.category_id, repair, "category")?;
            let (Some(space_id), Some(category_id)) = (space_id, category_id) else {
                debug!(bookmark = %bookmark.id, "dropping orphaned bookmark");
                report.dropped += 1;
                continue;
            };
            bookmarks.insert_restored(user_id, &space_id, &category_id, bookmark)?;
            report.bookmarks += 1;
        }

        if let (Some(restored), Some(allowed)) = (&payload.settings, registration) {
            let mut restored = restored.clone();
            restored.allow_registration = allowed;
            settings.insert_restored(user_id, &restored)?;
            report.settings_restored = true;
        }

        tx.commit().map_err(db_err)
    }

    /// Writes archive icon entries into the store. Failures are per entry.
    fn extract_files(&self, files: &[ArchiveEntry], report: &mut RestoreReport) {
        for entry in files {
            let legacy = entry.name.starts_with(LEGACY_ICONS_PREFIX);
            if !legacy && !entry.name.starts_with(SPACES_PREFIX) {
                debug!(entry = %entry.name, "ignoring unknown archive entry");
                continue;
            }
            match self.icons.write_archive_entry(&entry.name, &entry.data) {
                Ok(true) if legacy => report.legacy_icons += 1,
                Ok(true) => report.space_icons += 1,
                Ok(false) => {}
                Err(e) => warn!(entry = %entry.name, error = %e, "failed to extract icon"),
            }
        }
    }

    /// Re-resolves favicons for auto-iconed bookmarks whose file is missing or empty.
    async fn refetch_missing_icons(&self, user_id: &str, report: &mut RestoreReport) -> Result<(), BackupError> {
        let candidates = {
            let conn = self.db.connection();
            BookmarkManager::new(&conn).list_auto_icon_candidates(user_id)?
        };

        let mut resolved: HashMap<String, ResolvedIcon> = HashMap::new();
        for bookmark in candidates {
            report.favicons_checked += 1;
            let present = bookmark
                .icon_path
                .as_deref()
                .and_then(|p| self.icons.file_size(p))
                .is_some_and(|size| size > 0);
            if present {
                continue;
            }

            let icon = match resolved.get(&bookmark.service_url) {
                Some(icon) => icon.clone(),
                None => {
                    let icon = self.favicons.refresh(&bookmark.service_url).await;
                    resolved.insert(bookmark.service_url.clone(), icon.clone());
                    icon
                }
            };

            if !icon.is_found() {
                debug!(bookmark = %bookmark.id, url = %bookmark.service_url, "favicon re-fetch found nothing");
                report.favicons_skipped += 1;
                continue;
            }

            let conn = self.db.connection();
            match BookmarkManager::new(&conn).set_icon(
                user_id,
                &bookmark.id,
                icon.icon_path.as_deref(),
                icon.icon_url.as_deref(),
                false,
            ) {
                Ok(()) => report.favicons_refetched += 1,
                Err(e) => {
                    warn!(bookmark = %bookmark.id, error = %e, "failed to store re-fetched favicon");
                    report.favicons_skipped += 1;
                }
            }
        }
        Ok(())
    }
}
