//! Schema migrations for the bookdash SQLite database.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use rusqlite::Connection;

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current schema version from the database (0 if table doesn't exist).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending schema migrations against the provided connection.
///
/// Safe to call on every startup.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    // journal_mode reports the resulting mode as a row ("memory" for in-memory databases)
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );"
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Initial schema: spaces, categories, bookmarks, settings")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Add favicon_cache keyed by exact target URL")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, now, description],
    )?;
    Ok(())
}

/// V1: dashboard entities. Parent references are plain columns; cascades are
/// done by the managers and restore may store unresolved references.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS spaces (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            icon_path TEXT,
            icon_url TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_spaces_user_order ON spaces(user_id, sort_order);

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            space_id TEXT NOT NULL,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            icon_path TEXT,
            icon_url TEXT,
            sort_by TEXT NOT NULL DEFAULT 'custom',
            num_rows INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_categories_user_space_order
            ON categories(user_id, space_id, sort_order);

        CREATE TABLE IF NOT EXISTS bookmarks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            space_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            icon_path TEXT,
            icon_url TEXT,
            icon_is_uploaded INTEGER NOT NULL DEFAULT 0,
            service_url TEXT NOT NULL,
            opening_method TEXT NOT NULL DEFAULT 'same-tab',
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_bookmarks_user_category_order
            ON bookmarks(user_id, category_id, sort_order);

        CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            allow_registration INTEGER NOT NULL DEFAULT 0,
            theme_mode TEXT NOT NULL DEFAULT 'dark',
            theme_primary TEXT NOT NULL,
            theme_accent TEXT NOT NULL,
            theme_font TEXT NOT NULL,
            layout_mode TEXT NOT NULL DEFAULT 'auto',
            item_size TEXT NOT NULL DEFAULT 'medium',
            fit_box_mode TEXT NOT NULL DEFAULT 'auto',
            custom_css TEXT NOT NULL DEFAULT ''
        );
        "
    )
}

/// V2: persisted favicon cache, including negative results.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS favicon_cache (
            target_url TEXT PRIMARY KEY,
            icon_path TEXT,
            icon_url TEXT,
            updated_at INTEGER NOT NULL
        );
        "
    )
}
