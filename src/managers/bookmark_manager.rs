//! Bookmark Manager for bookdash.
//!
//! Implements `BookmarkManagerTrait`: CRUD, ordering within a category and
//! icon bookkeeping for bookmarks, backed by SQLite via `rusqlite`.
//!
//! Favicon resolution is not done here; callers resolve first and pass the
//! result in, so the manager stays synchronous.

use rusqlite::{params, Connection, OptionalExtension};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::services::icon_store::public_url_for_path;
use crate::types::bookmark::{Bookmark, BookmarkUpdate, NewBookmark, OpeningMethod};
use crate::types::errors::BookmarkError;
use crate::types::icon::IconChange;
use crate::types::ordering::OrderUpdate;

const BOOKMARK_COLUMNS: &str = "id, user_id, space_id, category_id, title, description, icon_path, icon_url, \
     icon_is_uploaded, service_url, opening_method, sort_order, created_at";

/// Trait defining bookmark management operations. Every call is scoped to one user.
pub trait BookmarkManagerTrait {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
    fn list_in_category(&self, user_id: &str, category_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
    /// Lists the user's bookmarks exactly as stored, with no derived icon URL.
    fn list_stored(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
    fn get_bookmark(&self, user_id: &str, id: &str) -> Result<Bookmark, BookmarkError>;
    fn create_bookmark(&mut self, user_id: &str, new: NewBookmark) -> Result<Bookmark, BookmarkError>;
    fn update_bookmark(&mut self, user_id: &str, id: &str, update: BookmarkUpdate) -> Result<Bookmark, BookmarkError>;
    /// Overwrites the icon reference and the uploaded flag.
    fn set_icon(&mut self, user_id: &str, id: &str, icon_path: Option<&str>, icon_url: Option<&str>, uploaded: bool) -> Result<(), BookmarkError>;
    fn delete_bookmark(&mut self, user_id: &str, id: &str) -> Result<(), BookmarkError>;
    fn reorder_bookmarks(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), BookmarkError>;
    fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<i64, BookmarkError>;
    /// Bookmarks whose icon may be replaced automatically: not uploaded, with a service URL.
    fn list_auto_icon_candidates(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, BookmarkError>;
    /// Inserts a bookmark from a backup under a fresh identifier with the given
    /// parent references. Returns the new ID.
    fn insert_restored(&mut self, user_id: &str, space_id: &str, category_id: &str, bookmark: &Bookmark) -> Result<String, BookmarkError>;
}

/// Returns an error unless `url` is an absolute http(s) URL with a host.
pub fn validate_service_url(url: &str) -> Result<(), BookmarkError> {
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => Ok(()),
        _ => Err(BookmarkError::InvalidUrl(url.to_string())),
    }
}

/// Bookmark manager backed by a SQLite connection.
pub struct BookmarkManager<'a> {
    conn: &'a Connection,
}

impl<'a> BookmarkManager<'a> {
    /// Creates a new `BookmarkManager` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let opening: String = row.get(10)?;
        Ok(Bookmark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            space_id: row.get(2)?,
            category_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            icon_path: row.get(6)?,
            icon_url: row.get(7)?,
            icon_is_uploaded: row.get(8)?,
            service_url: row.get(9)?,
            opening_method: OpeningMethod::from_str_lossy(&opening),
            order: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn with_public_icon(mut bookmark: Bookmark) -> Bookmark {
        if bookmark.icon_url.is_none() {
            bookmark.icon_url = bookmark.icon_path.as_deref().map(public_url_for_path);
        }
        bookmark
    }

    /// Checks that the category exists for the user and lives in `space_id`.
    fn check_parents(&self, user_id: &str, space_id: &str, category_id: &str) -> Result<(), BookmarkError> {
        let parent_space: Option<String> = self
            .conn
            .query_row(
                "SELECT space_id FROM categories WHERE id = ?1 AND user_id = ?2",
                params![category_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Self::db_err)?;

        match parent_space {
            Some(sid) if sid == space_id => Ok(()),
            _ => Err(BookmarkError::CategoryNotFound(category_id.to_string())),
        }
    }

    fn query_list(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Bookmark>, BookmarkError> {
        let mut stmt = self.conn.prepare(sql).map_err(Self::db_err)?;
        let rows = stmt
            .query_map(args, Self::row_to_bookmark)
            .map_err(Self::db_err)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(Self::db_err)?);
        }
        Ok(results)
    }

    fn db_err(e: rusqlite::Error) -> BookmarkError {
        BookmarkError::DatabaseError(e.to_string())
    }
}

impl<'a> BookmarkManagerTrait for BookmarkManager<'a> {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        Ok(self.list_stored(user_id)?.into_iter().map(Self::with_public_icon).collect())
    }

    fn list_stored(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        self.query_list(
            &format!(
                "SELECT {} FROM bookmarks WHERE user_id = ?1 ORDER BY sort_order, rowid",
                BOOKMARK_COLUMNS
            ),
            &[&user_id],
        )
    }

    fn list_in_category(&self, user_id: &str, category_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        let rows = self.query_list(
            &format!(
                "SELECT {} FROM bookmarks WHERE user_id = ?1 AND category_id = ?2 ORDER BY sort_order, rowid",
                BOOKMARK_COLUMNS
            ),
            &[&user_id, &category_id],
        )?;
        Ok(rows.into_iter().map(Self::with_public_icon).collect())
    }

    fn get_bookmark(&self, user_id: &str, id: &str) -> Result<Bookmark, BookmarkError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM bookmarks WHERE id = ?1 AND user_id = ?2", BOOKMARK_COLUMNS),
                params![id, user_id],
                Self::row_to_bookmark,
            )
            .optional()
            .map_err(Self::db_err)?
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))
    }

    /// Adds a bookmark at the end of its category (order = current count there).
    fn create_bookmark(&mut self, user_id: &str, new: NewBookmark) -> Result<Bookmark, BookmarkError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(BookmarkError::Invalid("title is required".to_string()));
        }
        validate_service_url(&new.service_url)?;
        self.check_parents(user_id, &new.space_id, &new.category_id)?;

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            order: self.count_in_category(user_id, &new.category_id)?,
            space_id: new.space_id,
            category_id: new.category_id,
            title: title.to_string(),
            description: new.description.unwrap_or_default(),
            icon_path: new.icon_path,
            icon_url: new.icon_url,
            icon_is_uploaded: new.icon_is_uploaded,
            service_url: new.service_url,
            opening_method: new.opening_method.unwrap_or_default(),
            created_at: Self::now(),
        };

        self.conn
            .execute(
                &format!(
                    "INSERT INTO bookmarks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    BOOKMARK_COLUMNS
                ),
                params![
                    bookmark.id,
                    bookmark.user_id,
                    bookmark.space_id,
                    bookmark.category_id,
                    bookmark.title,
                    bookmark.description,
                    bookmark.icon_path,
                    bookmark.icon_url,
                    bookmark.icon_is_uploaded,
                    bookmark.service_url,
                    bookmark.opening_method.as_str(),
                    bookmark.order,
                    bookmark.created_at
                ],
            )
            .map_err(Self::db_err)?;

        Ok(bookmark)
    }

    /// Applies a partial update.
    ///
    /// Setting an icon marks it uploaded unless the update says otherwise;
    /// removing an icon clears the uploaded flag.
    fn update_bookmark(&mut self, user_id: &str, id: &str, update: BookmarkUpdate) -> Result<Bookmark, BookmarkError> {
        let mut bookmark = self.get_bookmark(user_id, id)?;

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(BookmarkError::Invalid("title is required".to_string()));
            }
            bookmark.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            bookmark.description = description;
        }
        if let Some(url) = update.service_url {
            validate_service_url(&url)?;
            bookmark.service_url = url;
        }
        if let Some(method) = update.opening_method {
            bookmark.opening_method = method;
        }
        if update.space_id.is_some() || update.category_id.is_some() {
            let space_id = update.space_id.unwrap_or_else(|| bookmark.space_id.clone());
            let category_id = update.category_id.unwrap_or_else(|| bookmark.category_id.clone());
            self.check_parents(user_id, &space_id, &category_id)?;
            bookmark.space_id = space_id;
            bookmark.category_id = category_id;
        }
        match update.icon_change {
            IconChange::Keep => {
                if let Some(uploaded) = update.icon_is_uploaded {
                    bookmark.icon_is_uploaded = uploaded;
                }
            }
            IconChange::Set { path, url } => {
                bookmark.icon_path = path;
                bookmark.icon_url = url;
                bookmark.icon_is_uploaded = update.icon_is_uploaded.unwrap_or(true);
            }
            IconChange::Remove => {
                bookmark.icon_path = None;
                bookmark.icon_url = None;
                bookmark.icon_is_uploaded = false;
            }
        }

        self.conn
            .execute(
                "UPDATE bookmarks SET space_id = ?1, category_id = ?2, title = ?3, description = ?4, \
                 icon_path = ?5, icon_url = ?6, icon_is_uploaded = ?7, service_url = ?8, opening_method = ?9 \
                 WHERE id = ?10 AND user_id = ?11",
                params![
                    bookmark.space_id,
                    bookmark.category_id,
                    bookmark.title,
                    bookmark.description,
                    bookmark.icon_path,
                    bookmark.icon_url,
                    bookmark.icon_is_uploaded,
                    bookmark.service_url,
                    bookmark.opening_method.as_str(),
                    id,
                    user_id
                ],
            )
            .map_err(Self::db_err)?;

        Ok(Self::with_public_icon(bookmark))
    }

    fn set_icon(
        &mut self,
        user_id: &str,
        id: &str,
        icon_path: Option<&str>,
        icon_url: Option<&str>,
        uploaded: bool,
    ) -> Result<(), BookmarkError> {
        let affected = self
            .conn
            .execute(
                "UPDATE bookmarks SET icon_path = ?1, icon_url = ?2, icon_is_uploaded = ?3 \
                 WHERE id = ?4 AND user_id = ?5",
                params![icon_path, icon_url, uploaded, id, user_id],
            )
            .map_err(Self::db_err)?;

        if affected == 0 {
            return Err(BookmarkError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_bookmark(&mut self, user_id: &str, id: &str) -> Result<(), BookmarkError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;

        if affected == 0 {
            return Err(BookmarkError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn reorder_bookmarks(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), BookmarkError> {
        for item in items {
            self.conn
                .execute(
                    "UPDATE bookmarks SET sort_order = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![item.order, item.id, user_id],
                )
                .map_err(Self::db_err)?;
        }
        Ok(())
    }

    fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<i64, BookmarkError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1 AND category_id = ?2",
                params![user_id, category_id],
                |row| row.get(0),
            )
            .map_err(Self::db_err)
    }

    fn list_auto_icon_candidates(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        self.query_list(
            &format!(
                "SELECT {} FROM bookmarks WHERE user_id = ?1 AND icon_is_uploaded = 0 AND service_url <> '' \
                 ORDER BY sort_order, rowid",
                BOOKMARK_COLUMNS
            ),
            &[&user_id],
        )
    }

    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, BookmarkError> {
        self.conn
            .execute("DELETE FROM bookmarks WHERE user_id = ?1", params![user_id])
            .map_err(Self::db_err)
    }

    fn insert_restored(
        &mut self,
        user_id: &str,
        space_id: &str,
        category_id: &str,
        bookmark: &Bookmark,
    ) -> Result<String, BookmarkError> {
        let id = Uuid::new_v4().to_string();
        let created_at = if bookmark.created_at == 0 { Self::now() } else { bookmark.created_at };
        self.conn
            .execute(
                &format!(
                    "INSERT INTO bookmarks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    BOOKMARK_COLUMNS
                ),
                params![
                    id,
                    user_id,
                    space_id,
                    category_id,
                    bookmark.title,
                    bookmark.description,
                    bookmark.icon_path,
                    bookmark.icon_url,
                    bookmark.icon_is_uploaded,
                    bookmark.service_url,
                    bookmark.opening_method.as_str(),
                    bookmark.order,
                    created_at
                ],
            )
            .map_err(Self::db_err)?;
        Ok(id)
    }
}
