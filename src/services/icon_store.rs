//! Icon file store for bookdash.
//!
//! Icons live under the configured upload directory:
//!
//! ```text
//! uploads/
//!   icons/                              fetched favicons (flat, legacy layout)
//!   spaces/{space}/space.png            space logos
//!   spaces/{space}/{category}/...       category and bookmark icons
//! ```
//!
//! Directory names are sanitized entity names, so renaming a space does not
//! move its files.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::types::config::ServerConfig;
use crate::types::errors::IconStoreError;
use crate::types::icon::{StoredIcon, UploadTarget};

pub const LEGACY_ICONS_DIR: &str = "icons";
pub const SPACES_DIR: &str = "spaces";
pub const ALLOWED_UPLOAD_EXTENSIONS: [&str; 6] = ["png", "svg", "jpeg", "jpg", "ico", "webp"];

const MAX_SANITIZED_LEN: usize = 100;

/// Makes an entity name safe to use as a single path component.
///
/// Reserved characters and control characters become `_`, whitespace runs
/// become `_`, repeated underscores collapse, leading/trailing underscores are
/// trimmed and the result is capped at 100 characters. An empty or dot-only
/// result is replaced by `unnamed`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let mapped = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c if c.is_whitespace() => '_',
            c => c,
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed: String = out.trim_matches('_').chars().take(MAX_SANITIZED_LEN).collect();
    if trimmed.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        trimmed
    }
}

/// Derives a public URL from a stored icon path.
///
/// Everything from the first `uploads` segment on is served as-is; paths
/// without it are returned unchanged.
pub fn public_url_for_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.find("uploads") {
        Some(idx) => format!("/{}", &normalized[idx..]),
        None => normalized,
    }
}

/// Returns the lowercase extension of `file_name` if it is an accepted upload type.
pub fn upload_extension(file_name: &str) -> Result<String, IconStoreError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(IconStoreError::InvalidFileType(if ext.is_empty() {
            file_name.to_string()
        } else {
            format!(".{}", ext)
        }))
    }
}

/// Converts an archive-style relative name into a path that cannot escape its base.
fn safe_relative(name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\\') {
        return None;
    }
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Filesystem-backed icon storage rooted at the upload directory.
#[derive(Debug, Clone)]
pub struct IconStore {
    root: PathBuf,
    public_prefix: String,
    max_upload_bytes: u64,
}

impl IconStore {
    pub fn new<P: Into<PathBuf>>(root: P, public_prefix: &str, max_upload_bytes: u64) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.upload_dir,
            &config.public_upload_prefix,
            config.max_icon_upload_bytes,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Flat directory for fetched favicons and pre-hierarchy backups.
    pub fn legacy_dir(&self) -> PathBuf {
        self.root.join(LEGACY_ICONS_DIR)
    }

    pub fn spaces_dir(&self) -> PathBuf {
        self.root.join(SPACES_DIR)
    }

    pub fn space_dir(&self, space_name: &str) -> PathBuf {
        self.spaces_dir().join(sanitize_file_name(space_name))
    }

    pub fn category_dir(&self, space_name: &str, category_name: &str) -> PathBuf {
        self.space_dir(space_name).join(sanitize_file_name(category_name))
    }

    fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, IconStoreError> {
        fs::create_dir_all(dir).map_err(|e| {
            IconStoreError::FileSystemError(format!("create {}: {}", dir.display(), e))
        })?;
        let path = dir.join(file_name);
        fs::write(&path, bytes).map_err(|e| {
            IconStoreError::FileSystemError(format!("write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Persists a fetched favicon under a random name in the flat icon directory.
    pub fn save_fetched_icon(&self, bytes: &[u8], ext: &str) -> Result<StoredIcon, IconStoreError> {
        let file_name = format!("{}.{}", Uuid::new_v4().simple(), ext);
        let path = Self::write_file(&self.legacy_dir(), &file_name, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "stored fetched favicon");
        Ok(StoredIcon {
            icon_path: path.to_string_lossy().to_string(),
            icon_url: format!("{}/{}/{}", self.public_prefix, LEGACY_ICONS_DIR, file_name),
        })
    }

    /// Stores a user-supplied icon in the hierarchical layout.
    ///
    /// # Errors
    /// Rejects files over the size limit and extensions outside
    /// [`ALLOWED_UPLOAD_EXTENSIONS`].
    pub fn save_uploaded_icon(
        &self,
        target: &UploadTarget,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredIcon, IconStoreError> {
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(IconStoreError::TooLarge(bytes.len() as u64));
        }
        let ext = upload_extension(original_name)?;

        let (dir, rel_dir, file_name) = match target {
            UploadTarget::Space { space_name } => {
                let space = sanitize_file_name(space_name);
                (self.space_dir(space_name), space, format!("space.{}", ext))
            }
            UploadTarget::Category { space_name, category_name } => (
                self.category_dir(space_name, category_name),
                format!("{}/{}", sanitize_file_name(space_name), sanitize_file_name(category_name)),
                format!("category.{}", ext),
            ),
            UploadTarget::Bookmark { space_name, category_name, title } => {
                let stem = match title.as_deref() {
                    Some(t) if !t.trim().is_empty() => sanitize_file_name(t),
                    _ => Uuid::new_v4().simple().to_string(),
                };
                (
                    self.category_dir(space_name, category_name),
                    format!("{}/{}", sanitize_file_name(space_name), sanitize_file_name(category_name)),
                    format!("{}.{}", stem, ext),
                )
            }
        };

        let path = Self::write_file(&dir, &file_name, bytes)?;
        Ok(StoredIcon {
            icon_path: path.to_string_lossy().to_string(),
            icon_url: format!("{}/{}/{}/{}", self.public_prefix, SPACES_DIR, rel_dir, file_name),
        })
    }

    /// Deletes a file from the flat icon directory by bare file name.
    pub fn delete_legacy_icon(&self, file_name: &str) -> Result<(), IconStoreError> {
        if file_name.is_empty()
            || file_name.contains("..")
            || file_name.contains('/')
            || file_name.contains('\\')
        {
            return Err(IconStoreError::InvalidFileName(file_name.to_string()));
        }
        let path = self.legacy_dir().join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IconStoreError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(IconStoreError::FileSystemError(e.to_string())),
        }
    }

    /// Best-effort removal of a stored file.
    pub fn discard(&self, path: &str) {
        if let Err(e) = fs::remove_file(path) {
            debug!(path, error = %e, "could not discard icon file");
        }
    }

    /// Size of a stored file, or `None` when it is missing or not a regular file.
    pub fn file_size(&self, path: &str) -> Option<u64> {
        if path.trim().is_empty() {
            return None;
        }
        fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }

    /// Lists every regular file under `spaces/` as `(archive name, absolute path)`.
    ///
    /// Archive names use `/` separators and keep the `spaces/` prefix. A
    /// missing directory yields an empty list.
    pub fn collect_space_files(&self) -> Result<Vec<(String, PathBuf)>, IconStoreError> {
        let base = self.spaces_dir();
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable icon entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&base)
                .map_err(|e| IconStoreError::FileSystemError(e.to_string()))?;
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            files.push((format!("{}/{}", SPACES_DIR, parts.join("/")), entry.into_path()));
        }
        Ok(files)
    }

    /// Writes an archive entry back into the store.
    ///
    /// `icons/...` entries land in the flat directory, `spaces/...` entries in
    /// the hierarchical layout; intermediate directories are created. Returns
    /// `Ok(false)` for names outside both prefixes or that would escape the
    /// store.
    pub fn write_archive_entry(&self, name: &str, data: &[u8]) -> Result<bool, IconStoreError> {
        let (base, rest) = if let Some(rest) = name.strip_prefix("icons/") {
            (self.legacy_dir(), rest)
        } else if let Some(rest) = name.strip_prefix("spaces/") {
            (self.spaces_dir(), rest)
        } else {
            return Ok(false);
        };

        let Some(rel) = safe_relative(rest) else {
            warn!(entry = name, "refusing archive entry with unsafe path");
            return Ok(false);
        };
        let target = base.join(rel);
        let dir = target.parent().unwrap_or(&base);
        let file_name = target
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .ok_or_else(|| IconStoreError::InvalidFileName(name.to_string()))?;
        Self::write_file(dir, &file_name, data)?;
        Ok(true)
    }
}
