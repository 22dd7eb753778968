//! Category Manager for bookdash.
//!
//! Implements `CategoryManagerTrait`: CRUD, ordering within a space and
//! cascade deletion of bookmarks, backed by SQLite via `rusqlite`.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::services::icon_store::public_url_for_path;
use crate::types::category::{
    Category, CategoryUpdate, NewCategory, DEFAULT_CATEGORY_ICON, DEFAULT_SORT_BY, MAX_ROWS,
    MIN_ROWS,
};
use crate::types::errors::CategoryError;
use crate::types::icon::IconChange;
use crate::types::ordering::OrderUpdate;

const CATEGORY_COLUMNS: &str =
    "id, user_id, space_id, name, icon, icon_path, icon_url, sort_by, num_rows, sort_order";

/// Trait defining category management operations. Every call is scoped to one user.
pub trait CategoryManagerTrait {
    fn list_categories(&self, user_id: &str) -> Result<Vec<Category>, CategoryError>;
    fn list_in_space(&self, user_id: &str, space_id: &str) -> Result<Vec<Category>, CategoryError>;
    /// Lists the user's categories exactly as stored, with no derived icon URL.
    fn list_stored(&self, user_id: &str) -> Result<Vec<Category>, CategoryError>;
    fn get_category(&self, user_id: &str, id: &str) -> Result<Category, CategoryError>;
    fn create_category(&mut self, user_id: &str, new: NewCategory) -> Result<Category, CategoryError>;
    fn update_category(&mut self, user_id: &str, id: &str, update: CategoryUpdate) -> Result<Category, CategoryError>;
    /// Deletes the category together with its bookmarks.
    fn delete_category(&mut self, user_id: &str, id: &str) -> Result<(), CategoryError>;
    fn reorder_categories(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), CategoryError>;
    fn count_in_space(&self, user_id: &str, space_id: &str) -> Result<i64, CategoryError>;
    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, CategoryError>;
    /// Inserts a category from a backup under a fresh identifier, pointing at
    /// `space_id`. Returns the new ID.
    fn insert_restored(&mut self, user_id: &str, space_id: &str, category: &Category) -> Result<String, CategoryError>;
}

/// Category manager backed by a SQLite connection.
pub struct CategoryManager<'a> {
    conn: &'a Connection,
}

impl<'a> CategoryManager<'a> {
    /// Creates a new `CategoryManager` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            user_id: row.get(1)?,
            space_id: row.get(2)?,
            name: row.get(3)?,
            icon: row.get(4)?,
            icon_path: row.get(5)?,
            icon_url: row.get(6)?,
            sort_by: row.get(7)?,
            num_rows: row.get(8)?,
            order: row.get(9)?,
        })
    }

    fn with_public_icon(mut category: Category) -> Category {
        if category.icon_url.is_none() {
            category.icon_url = category.icon_path.as_deref().map(public_url_for_path);
        }
        category
    }

    fn validate_rows(num_rows: i64) -> Result<(), CategoryError> {
        if !(MIN_ROWS..=MAX_ROWS).contains(&num_rows) {
            return Err(CategoryError::Invalid(format!(
                "numRows must be between {} and {}, got {}",
                MIN_ROWS, MAX_ROWS, num_rows
            )));
        }
        Ok(())
    }

    fn space_exists(&self, user_id: &str, space_id: &str) -> Result<bool, CategoryError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM spaces WHERE id = ?1 AND user_id = ?2",
                params![space_id, user_id],
                |row| row.get(0),
            )
            .map_err(Self::db_err)?;
        Ok(count > 0)
    }

    fn query_list(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Category>, CategoryError> {
        let mut stmt = self.conn.prepare(sql).map_err(Self::db_err)?;
        let rows = stmt
            .query_map(args, Self::row_to_category)
            .map_err(Self::db_err)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(Self::db_err)?);
        }
        Ok(results)
    }

    fn db_err(e: rusqlite::Error) -> CategoryError {
        CategoryError::DatabaseError(e.to_string())
    }
}

impl<'a> CategoryManagerTrait for CategoryManager<'a> {
    fn list_categories(&self, user_id: &str) -> Result<Vec<Category>, CategoryError> {
        Ok(self.list_stored(user_id)?.into_iter().map(Self::with_public_icon).collect())
    }

    fn list_in_space(&self, user_id: &str, space_id: &str) -> Result<Vec<Category>, CategoryError> {
        let rows = self.query_list(
            &format!(
                "SELECT {} FROM categories WHERE user_id = ?1 AND space_id = ?2 ORDER BY sort_order, rowid",
                CATEGORY_COLUMNS
            ),
            &[&user_id, &space_id],
        )?;
        Ok(rows.into_iter().map(Self::with_public_icon).collect())
    }

    fn list_stored(&self, user_id: &str) -> Result<Vec<Category>, CategoryError> {
        self.query_list(
            &format!(
                "SELECT {} FROM categories WHERE user_id = ?1 ORDER BY sort_order, rowid",
                CATEGORY_COLUMNS
            ),
            &[&user_id],
        )
    }

    fn get_category(&self, user_id: &str, id: &str) -> Result<Category, CategoryError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM categories WHERE id = ?1 AND user_id = ?2",
                    CATEGORY_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_category,
            )
            .optional()
            .map_err(Self::db_err)?
            .map(Self::with_public_icon)
            .ok_or_else(|| CategoryError::NotFound(id.to_string()))
    }

    /// Creates a category at the end of its space (order = current count in that space).
    fn create_category(&mut self, user_id: &str, new: NewCategory) -> Result<Category, CategoryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(CategoryError::Invalid("name is required".to_string()));
        }
        let num_rows = new.num_rows.unwrap_or(MIN_ROWS);
        Self::validate_rows(num_rows)?;
        if !self.space_exists(user_id, &new.space_id)? {
            return Err(CategoryError::SpaceNotFound(new.space_id));
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            order: self.count_in_space(user_id, &new.space_id)?,
            space_id: new.space_id,
            name: name.to_string(),
            icon: new.icon.unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            icon_path: new.icon_path,
            icon_url: new.icon_url,
            sort_by: new.sort_by.unwrap_or_else(|| DEFAULT_SORT_BY.to_string()),
            num_rows,
        };

        self.conn
            .execute(
                "INSERT INTO categories (id, user_id, space_id, name, icon, icon_path, icon_url, sort_by, num_rows, sort_order) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    category.id,
                    category.user_id,
                    category.space_id,
                    category.name,
                    category.icon,
                    category.icon_path,
                    category.icon_url,
                    category.sort_by,
                    category.num_rows,
                    category.order
                ],
            )
            .map_err(Self::db_err)?;

        Ok(category)
    }

    fn update_category(&mut self, user_id: &str, id: &str, update: CategoryUpdate) -> Result<Category, CategoryError> {
        let mut category = self.get_category(user_id, id)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(CategoryError::Invalid("name is required".to_string()));
            }
            category.name = name.trim().to_string();
        }
        if let Some(icon) = update.icon {
            category.icon = icon;
        }
        if let Some(sort_by) = update.sort_by {
            category.sort_by = sort_by;
        }
        if let Some(num_rows) = update.num_rows {
            Self::validate_rows(num_rows)?;
            category.num_rows = num_rows;
        }
        match update.icon_change {
            IconChange::Keep => {}
            IconChange::Set { path, url } => {
                category.icon_path = path;
                category.icon_url = url;
            }
            IconChange::Remove => {
                category.icon_path = None;
                category.icon_url = None;
            }
        }

        self.conn
            .execute(
                "UPDATE categories SET name = ?1, icon = ?2, icon_path = ?3, icon_url = ?4, sort_by = ?5, num_rows = ?6 \
                 WHERE id = ?7 AND user_id = ?8",
                params![
                    category.name,
                    category.icon,
                    category.icon_path,
                    category.icon_url,
                    category.sort_by,
                    category.num_rows,
                    id,
                    user_id
                ],
            )
            .map_err(Self::db_err)?;

        Ok(Self::with_public_icon(category))
    }

    fn delete_category(&mut self, user_id: &str, id: &str) -> Result<(), CategoryError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;

        if affected == 0 {
            return Err(CategoryError::NotFound(id.to_string()));
        }

        self.conn
            .execute(
                "DELETE FROM bookmarks WHERE category_id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    fn reorder_categories(&mut self, user_id: &str, items: &[OrderUpdate]) -> Result<(), CategoryError> {
        for item in items {
            self.conn
                .execute(
                    "UPDATE categories SET sort_order = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![item.order, item.id, user_id],
                )
                .map_err(Self::db_err)?;
        }
        Ok(())
    }

    fn count_in_space(&self, user_id: &str, space_id: &str) -> Result<i64, CategoryError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM categories WHERE user_id = ?1 AND space_id = ?2",
                params![user_id, space_id],
                |row| row.get(0),
            )
            .map_err(Self::db_err)
    }

    fn delete_all_for_user(&mut self, user_id: &str) -> Result<usize, CategoryError> {
        self.conn
            .execute("DELETE FROM categories WHERE user_id = ?1", params![user_id])
            .map_err(Self::db_err)
    }

    fn insert_restored(&mut self, user_id: &str, space_id: &str, category: &Category) -> Result<String, CategoryError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO categories (id, user_id, space_id, name, icon, icon_path, icon_url, sort_by, num_rows, sort_order) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    user_id,
                    space_id,
                    category.name,
                    category.icon,
                    category.icon_path,
                    category.icon_url,
                    category.sort_by,
                    category.num_rows,
                    category.order
                ],
            )
            .map_err(Self::db_err)?;
        Ok(id)
    }
}
