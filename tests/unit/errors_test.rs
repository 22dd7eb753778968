use bookdash::types::errors::*;

// === SpaceError Tests ===

#[test]
fn space_error_display_variants() {
    assert_eq!(SpaceError::NotFound("s-1".to_string()).to_string(), "Space not found: s-1");
    assert_eq!(
        SpaceError::Invalid("name is required".to_string()).to_string(),
        "Invalid space: name is required"
    );
    assert_eq!(
        SpaceError::DatabaseError("locked".to_string()).to_string(),
        "Space database error: locked"
    );
}

#[test]
fn space_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(SpaceError::NotFound("id".to_string()));
    assert!(err.source().is_none());
}

// === CategoryError Tests ===

#[test]
fn category_error_display_variants() {
    assert_eq!(CategoryError::NotFound("c-1".to_string()).to_string(), "Category not found: c-1");
    assert_eq!(
        CategoryError::SpaceNotFound("s-9".to_string()).to_string(),
        "Category space not found: s-9"
    );
}

// === BookmarkError Tests ===

#[test]
fn bookmark_error_display_variants() {
    assert_eq!(BookmarkError::NotFound("b-1".to_string()).to_string(), "Bookmark not found: b-1");
    assert_eq!(
        BookmarkError::InvalidUrl("ftp://x".to_string()).to_string(),
        "Invalid bookmark URL: ftp://x"
    );
    assert_eq!(
        BookmarkError::CategoryNotFound("c-2".to_string()).to_string(),
        "Bookmark category not found: c-2"
    );
}

// === IconStoreError Tests ===

#[test]
fn icon_store_error_lists_allowed_types() {
    let msg = IconStoreError::InvalidFileType(".exe".to_string()).to_string();
    assert!(msg.contains(".exe"));
    assert!(msg.contains("PNG, SVG, JPEG, JPG, ICO, WEBP"));
}

#[test]
fn icon_store_error_too_large_reports_size() {
    assert_eq!(IconStoreError::TooLarge(42).to_string(), "Icon too large: 42 bytes");
}

// === BackupError Tests ===

#[test]
fn backup_error_invalid_backup_prefix() {
    let err = BackupError::InvalidBackup("data.json not found".to_string());
    assert_eq!(err.to_string(), "Invalid backup: data.json not found");
}

#[test]
fn backup_error_from_manager_errors_is_database_error() {
    let err: BackupError = SpaceError::DatabaseError("disk full".to_string()).into();
    assert!(matches!(err, BackupError::DatabaseError(ref m) if m.contains("disk full")));

    let err: BackupError = BookmarkError::NotFound("b".to_string()).into();
    assert!(matches!(err, BackupError::DatabaseError(_)));
}

#[test]
fn backup_error_from_icon_store_error_is_file_system_error() {
    let err: BackupError = IconStoreError::FileSystemError("denied".to_string()).into();
    assert!(matches!(err, BackupError::FileSystemError(ref m) if m.contains("denied")));
}

// === ConfigError / FaviconError Tests ===

#[test]
fn config_error_display_variants() {
    assert_eq!(ConfigError::InvalidKey("nope".to_string()).to_string(), "Invalid config key: nope");
    assert_eq!(
        ConfigError::InvalidEnv("BOOKDASH_FETCH_TIMEOUT_SECS=x".to_string()).to_string(),
        "Invalid environment override: BOOKDASH_FETCH_TIMEOUT_SECS=x"
    );
}

#[test]
fn favicon_error_display_variants() {
    assert_eq!(
        FaviconError::EmptyResponse("https://a.example/favicon.ico".to_string()).to_string(),
        "Empty favicon response: https://a.example/favicon.ico"
    );
    assert_eq!(
        FaviconError::InvalidUrl("nope".to_string()).to_string(),
        "Invalid favicon target URL: nope"
    );
}
