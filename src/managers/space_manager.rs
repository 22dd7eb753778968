//! Space Manager for bookdash.
//!
//! Implements `SpaceManagerTrait`: CRUD, ordering and cascade deletion for
//! spaces, backed by SQLite via `rusqlite`.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::services::icon_store::public_url_for_path;
use crate::types::errors::SpaceError;
use crate::types::icon::IconChange;
use crate::types::ordering::OrderUpdate;
use crate::types::space::{NewSpace, Space, SpaceUpdate, DEFAULT_SPACE_ICON};

const SPACE_COLUMNS: &str = "id, user_id, name, icon, icon_path, icon_url, sort_order";

/// Trait defining space management operations. Every call is scoped to one user.
pub trait SpaceManagerTrait {
    fn list_spaces(&self, user_id: &str) -> Result<Vec<Space>, SpaceError>;
    /// Lists the user's spaces exactly as stored, with no derived icon URL.
    fn list_stored(&self, user_id: &str) -> Result<Vec<Space>, SpaceError>;
    fn get_space(&self, user_id: &str, id: &str) -> Result<Space, SpaceError>;
    fn create_space(&mut self, user_id: &str, new: NewSpace) -> Result<Space, SpaceError>;
    fn update_space(&mut self, user_id: &str, id: &str, update: SpaceUpdate) -> Result<Space, SpaceError>;
    /// Deletes the space together with its categories and bookmarks.
    fn delete_space(&mut self, user_id: &str, id: &str) -> Result<(), SpaceError>;
    fn reorder_spaces(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), SpaceError>;
    fn count_spaces(&self, user_id: &str) -> Result<i64, SpaceError>;
    /// Removes every space owned by the user. Returns the number of rows deleted.
    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, SpaceError>;
    /// Inserts a space from a backup under a fresh identifier. Returns the new ID.
    fn insert_restored(&mut self, user_id: &str, space: &Space) -> Result<String, SpaceError>;
}

/// Space manager backed by a SQLite connection.
pub struct SpaceManager<'a> {
    conn: &'a Connection,
}

impl<'a> SpaceManager<'a> {
    /// Creates a new `SpaceManager` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_space(row: &rusqlite::Row) -> rusqlite::Result<Space> {
        Ok(Space {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            icon: row.get(3)?,
            icon_path: row.get(4)?,
            icon_url: row.get(5)?,
            order: row.get(6)?,
        })
    }

    /// Fills in a public icon URL when only the file path is stored.
    fn with_public_icon(mut space: Space) -> Space {
        if space.icon_url.is_none() {
            space.icon_url = space.icon_path.as_deref().map(public_url_for_path);
        }
        space
    }

    fn db_err(e: rusqlite::Error) -> SpaceError {
        SpaceError::DatabaseError(e.to_string())
    }
}

impl<'a> SpaceManagerTrait for SpaceManager<'a> {
    fn list_spaces(&self, user_id: &str) -> Result<Vec<Space>, SpaceError> {
        Ok(self.list_stored(user_id)?.into_iter().map(Self::with_public_icon).collect())
    }

    fn list_stored(&self, user_id: &str) -> Result<Vec<Space>, SpaceError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM spaces WHERE user_id = ?1 ORDER BY sort_order, rowid",
                SPACE_COLUMNS
            ))
            .map_err(Self::db_err)?;

        let rows = stmt
            .query_map(params![user_id], Self::row_to_space)
            .map_err(Self::db_err)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(Self::db_err)?);
        }
        Ok(results)
    }

    fn get_space(&self, user_id: &str, id: &str) -> Result<Space, SpaceError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM spaces WHERE id = ?1 AND user_id = ?2", SPACE_COLUMNS),
                params![id, user_id],
                Self::row_to_space,
            )
            .optional()
            .map_err(Self::db_err)?
            .map(Self::with_public_icon)
            .ok_or_else(|| SpaceError::NotFound(id.to_string()))
    }

    /// Creates a space at the end of the user's list (order = current count).
    fn create_space(&mut self, user_id: &str, new: NewSpace) -> Result<Space, SpaceError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(SpaceError::Invalid("name is required".to_string()));
        }

        let space = Space {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            icon: new.icon.unwrap_or_else(|| DEFAULT_SPACE_ICON.to_string()),
            icon_path: new.icon_path,
            icon_url: new.icon_url,
            order: self.count_spaces(user_id)?,
        };

        self.conn
            .execute(
                "INSERT INTO spaces (id, user_id, name, icon, icon_path, icon_url, sort_order) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    space.id,
                    space.user_id,
                    space.name,
                    space.icon,
                    space.icon_path,
                    space.icon_url,
                    space.order
                ],
            )
            .map_err(Self::db_err)?;

        Ok(space)
    }

    fn update_space(&mut self, user_id: &str, id: &str, update: SpaceUpdate) -> Result<Space, SpaceError> {
        let mut space = self.get_space(user_id, id)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(SpaceError::Invalid("name is required".to_string()));
            }
            space.name = name.trim().to_string();
        }
        if let Some(icon) = update.icon {
            space.icon = icon;
        }
        match update.icon_change {
            IconChange::Keep => {}
            IconChange::Set { path, url } => {
                space.icon_path = path;
                space.icon_url = url;
            }
            IconChange::Remove => {
                space.icon_path = None;
                space.icon_url = None;
            }
        }

        self.conn
            .execute(
                "UPDATE spaces SET name = ?1, icon = ?2, icon_path = ?3, icon_url = ?4 \
                 WHERE id = ?5 AND user_id = ?6",
                params![space.name, space.icon, space.icon_path, space.icon_url, id, user_id],
            )
            .map_err(Self::db_err)?;

        Ok(Self::with_public_icon(space))
    }

    fn delete_space(&mut self, user_id: &str, id: &str) -> Result<(), SpaceError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM spaces WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;

        if affected == 0 {
            return Err(SpaceError::NotFound(id.to_string()));
        }

        self.conn
            .execute(
                "DELETE FROM categories WHERE space_id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;
        self.conn
            .execute(
                "DELETE FROM bookmarks WHERE space_id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Applies every `{id, order}` pair. Unknown or foreign IDs are ignored.
    fn reorder_spaces(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), SpaceError> {
        for item in items {
            self.conn
                .execute(
                    "UPDATE spaces SET sort_order = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![item.order, item.id, user_id],
                )
                .map_err(Self::db_err)?;
        }
        Ok(())
    }

    fn count_spaces(&self, user_id: &str) -> Result<i64, SpaceError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM spaces WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(Self::db_err)
    }

    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, SpaceError> {
        self.conn
            .execute("DELETE FROM spaces WHERE user_id = ?1", params![user_id])
            .map_err(Self::db_err)
    }

    fn insert_restored(&mut self, user_id: &str, space: &Space) -> Result<String, SpaceError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO spaces (id, user_id, name, icon, icon_path, icon_url, sort_order) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    user_id,
                    space.name,
                    space.icon,
                    space.icon_path,
                    space.icon_url,
                    space.order
                ],
            )
            .map_err(Self::db_err)?;
        Ok(id)
    }
}
