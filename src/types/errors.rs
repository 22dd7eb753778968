use std::fmt;

// === SpaceError ===

/// Errors related to space management operations.
#[derive(Debug)]
pub enum SpaceError {
    /// Space with the given ID was not found for this user.
    NotFound(String),
    /// The submitted space fields failed validation.
    Invalid(String),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceError::NotFound(id) => write!(f, "Space not found: {}", id),
            SpaceError::Invalid(msg) => write!(f, "Invalid space: {}", msg),
            SpaceError::DatabaseError(msg) => write!(f, "Space database error: {}", msg),
        }
    }
}

impl std::error::Error for SpaceError {}

// === CategoryError ===

/// Errors related to category management operations.
#[derive(Debug)]
pub enum CategoryError {
    /// Category with the given ID was not found for this user.
    NotFound(String),
    /// The owning space was not found for this user.
    SpaceNotFound(String),
    /// The submitted category fields failed validation.
    Invalid(String),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for CategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryError::NotFound(id) => write!(f, "Category not found: {}", id),
            CategoryError::SpaceNotFound(id) => write!(f, "Category space not found: {}", id),
            CategoryError::Invalid(msg) => write!(f, "Invalid category: {}", msg),
            CategoryError::DatabaseError(msg) => {
                write!(f, "Category database error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CategoryError {}

// === BookmarkError ===

/// Errors related to bookmark management operations.
#[derive(Debug)]
pub enum BookmarkError {
    /// Bookmark with the given ID was not found for this user.
    NotFound(String),
    /// The target category was not found, or does not belong to the given space.
    CategoryNotFound(String),
    /// The service URL is not an absolute http(s) URL.
    InvalidUrl(String),
    /// The submitted bookmark fields failed validation.
    Invalid(String),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            BookmarkError::CategoryNotFound(id) => {
                write!(f, "Bookmark category not found: {}", id)
            }
            BookmarkError::InvalidUrl(url) => write!(f, "Invalid bookmark URL: {}", url),
            BookmarkError::Invalid(msg) => write!(f, "Invalid bookmark: {}", msg),
            BookmarkError::DatabaseError(msg) => {
                write!(f, "Bookmark database error: {}", msg)
            }
        }
    }
}

impl std::error::Error for BookmarkError {}

// === SettingsError ===

/// Errors related to per-user dashboard settings.
#[derive(Debug)]
pub enum SettingsError {
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::DatabaseError(msg) => {
                write!(f, "Settings database error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

// === ConfigError ===

/// Errors related to loading and saving the server configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config file.
    IoError(String),
    /// Failed to serialize or deserialize the configuration.
    SerializationError(String),
    /// The provided configuration key is invalid or does not exist.
    InvalidKey(String),
    /// The value does not fit the key's type.
    InvalidValue(String),
    /// An environment override could not be parsed.
    InvalidEnv(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::SerializationError(msg) => {
                write!(f, "Config serialization error: {}", msg)
            }
            ConfigError::InvalidKey(key) => write!(f, "Invalid config key: {}", key),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::InvalidEnv(msg) => write!(f, "Invalid environment override: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// === IconStoreError ===

/// Errors related to the icon file store.
#[derive(Debug)]
pub enum IconStoreError {
    /// The file extension is not one of the accepted image types.
    InvalidFileType(String),
    /// The upload exceeds the configured size limit.
    TooLarge(u64),
    /// The file name contains path separators or parent references.
    InvalidFileName(String),
    /// The requested file does not exist.
    NotFound(String),
    /// A file system error occurred.
    FileSystemError(String),
}

impl fmt::Display for IconStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IconStoreError::InvalidFileType(ext) => write!(
                f,
                "Invalid file type: {} (allowed: PNG, SVG, JPEG, JPG, ICO, WEBP)",
                ext
            ),
            IconStoreError::TooLarge(size) => write!(f, "Icon too large: {} bytes", size),
            IconStoreError::InvalidFileName(name) => write!(f, "Invalid file name: {}", name),
            IconStoreError::NotFound(name) => write!(f, "Icon file not found: {}", name),
            IconStoreError::FileSystemError(msg) => {
                write!(f, "Icon file system error: {}", msg)
            }
        }
    }
}

impl std::error::Error for IconStoreError {}

// === FaviconError ===

/// Errors raised by a single favicon fetch step.
///
/// These never escape `FaviconService::resolve`; they only decide whether the
/// next discovery step is attempted.
#[derive(Debug)]
pub enum FaviconError {
    /// The target URL could not be parsed or has no origin.
    InvalidUrl(String),
    /// The request failed, timed out, or returned an error status.
    NetworkError(String),
    /// The response body was empty, or the page had no icon link.
    EmptyResponse(String),
    /// The downloaded icon could not be written to the icon store.
    StorageError(String),
}

impl fmt::Display for FaviconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaviconError::InvalidUrl(url) => write!(f, "Invalid favicon target URL: {}", url),
            FaviconError::NetworkError(msg) => write!(f, "Favicon network error: {}", msg),
            FaviconError::EmptyResponse(url) => write!(f, "Empty favicon response: {}", url),
            FaviconError::StorageError(msg) => write!(f, "Favicon storage error: {}", msg),
        }
    }
}

impl std::error::Error for FaviconError {}

// === BackupError ===

/// Errors related to backup export and restore.
#[derive(Debug)]
pub enum BackupError {
    /// The archive is structurally invalid (not a zip, no `data.json`, bad JSON).
    InvalidBackup(String),
    /// A parent reference could not be remapped under the `Fail` repair strategy.
    UnresolvedReference(String),
    /// Building or reading the zip container failed.
    ArchiveError(String),
    /// A file system error occurred.
    FileSystemError(String),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::InvalidBackup(msg) => write!(f, "Invalid backup: {}", msg),
            BackupError::UnresolvedReference(msg) => {
                write!(f, "Unresolved backup reference: {}", msg)
            }
            BackupError::ArchiveError(msg) => write!(f, "Backup archive error: {}", msg),
            BackupError::FileSystemError(msg) => {
                write!(f, "Backup file system error: {}", msg)
            }
            BackupError::DatabaseError(msg) => write!(f, "Backup database error: {}", msg),
        }
    }
}

impl std::error::Error for BackupError {}

impl From<SpaceError> for BackupError {
    fn from(e: SpaceError) -> Self {
        BackupError::DatabaseError(e.to_string())
    }
}

impl From<CategoryError> for BackupError {
    fn from(e: CategoryError) -> Self {
        BackupError::DatabaseError(e.to_string())
    }
}

impl From<BookmarkError> for BackupError {
    fn from(e: BookmarkError) -> Self {
        BackupError::DatabaseError(e.to_string())
    }
}

impl From<SettingsError> for BackupError {
    fn from(e: SettingsError) -> Self {
        BackupError::DatabaseError(e.to_string())
    }
}

impl From<IconStoreError> for BackupError {
    fn from(e: IconStoreError) -> Self {
        BackupError::FileSystemError(e.to_string())
    }
}
