//! Unit tests for the bookdash database layer (connection + migrations).

use bookdash::database::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use bookdash::database::Database;
use tempfile::TempDir;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_all_tables() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let expected_tables = ["spaces", "categories", "bookmarks", "settings", "favicon_cache", "schema_version"];

    for table in &expected_tables {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_migrations_create_indexes() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let expected_indexes = [
        "idx_spaces_user_order",
        "idx_categories_user_space_order",
        "idx_bookmarks_user_category_order",
    ];

    for index in &expected_indexes {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name=?1",
                [index],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Index '{}' should exist after migrations", index);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(&db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_reopen_on_disk_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("bookdash.db");

    {
        let db = Database::open(&path).expect("first open");
        db.connection()
            .execute(
                "INSERT INTO favicon_cache (target_url, updated_at) VALUES ('https://a.example', 1)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).expect("second open");
    let conn = db.connection();
    let versions: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM favicon_cache", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1, "data must survive reopening");
}

#[test]
fn test_favicon_cache_key_is_unique() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO favicon_cache (target_url, updated_at) VALUES ('https://a.example', 1)",
        [],
    )
    .unwrap();
    let dup = conn.execute(
        "INSERT INTO favicon_cache (target_url, updated_at) VALUES ('https://a.example', 2)",
        [],
    );
    assert!(dup.is_err());

    // Keys are exact strings: a trailing slash is a different URL.
    conn.execute(
        "INSERT INTO favicon_cache (target_url, updated_at) VALUES ('https://a.example/', 3)",
        [],
    )
    .unwrap();
}

#[test]
fn test_settings_user_id_is_unique() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    let insert = "INSERT INTO settings (id, user_id, allow_registration, theme_mode, theme_primary, theme_accent, \
                  theme_font, layout_mode, item_size, fit_box_mode, custom_css) \
                  VALUES (?1, 'u1', 0, 'dark', '#000', '#fff', 'Inter', 'auto', 'medium', 'auto', '')";
    conn.execute(insert, ["a"]).unwrap();
    assert!(conn.execute(insert, ["b"]).is_err());
}
