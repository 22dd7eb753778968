use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;
use super::category::Category;
use super::settings::Settings;
use super::space::Space;

/// Name of the JSON entry every backup archive must contain.
pub const DATA_ENTRY: &str = "data.json";
/// Archive prefix of the hierarchical icon layout.
pub const SPACES_PREFIX: &str = "spaces/";
/// Archive prefix used by older backups for the flat icon directory.
pub const LEGACY_ICONS_PREFIX: &str = "icons/";

/// The `data.json` document: a user's entire data graph with original identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(default)]
    pub spaces: Vec<Space>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
    #[serde(default)]
    pub settings: Option<Settings>,
}

/// A binary file entry carried by an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// A validated, fully-read backup archive.
#[derive(Debug, Clone, Default)]
pub struct BackupArchive {
    pub payload: BackupPayload,
    pub files: Vec<ArchiveEntry>,
}

/// What restore does with a parent reference missing from the old→new id maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    /// Skip the row.
    Drop,
    /// Insert the original reference verbatim.
    #[default]
    KeepDangling,
    /// Abort the restore; nothing is changed.
    Fail,
}

/// Restore tuning.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub repair: RepairStrategy,
}

/// Counters describing a finished restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub spaces: usize,
    pub categories: usize,
    pub bookmarks: usize,
    pub settings_restored: bool,
    pub dropped: usize,
    pub legacy_icons: usize,
    pub space_icons: usize,
    pub favicons_checked: usize,
    pub favicons_refetched: usize,
    pub favicons_skipped: usize,
}
