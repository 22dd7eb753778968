//! Settings Manager for bookdash.
//!
//! One settings row per user, created with defaults on first read. The
//! registration flag is global and mirrored on every row.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::types::errors::SettingsError;
use crate::types::settings::{
    FitBoxMode, ItemSize, Layout, LayoutMode, Settings, SettingsUpdate, Theme, ThemeMode,
};

const SETTINGS_COLUMNS: &str = "id, user_id, allow_registration, theme_mode, theme_primary, theme_accent, \
     theme_font, layout_mode, item_size, fit_box_mode, custom_css";

/// Trait defining settings operations.
pub trait SettingsManagerTrait {
    fn find_settings(&self, user_id: &str) -> Result<Option<Settings>, SettingsError>;
    /// Returns the user's settings, creating the default row if missing.
    fn get_or_create(&mut self, user_id: &str, allow_registration_default: bool) -> Result<Settings, SettingsError>;
    fn update_settings(&mut self, user_id: &str, update: SettingsUpdate, allow_registration_default: bool) -> Result<Settings, SettingsError>;
    /// Sets the global registration flag on every settings row.
    fn set_allow_registration(&mut self, allowed: bool) -> Result<(), SettingsError>;
    fn registration_allowed(&self, default: bool) -> Result<bool, SettingsError>;
    fn delete_for_user(&mut self, user_id: &str) -> Result<usize, SettingsError>;
    /// Inserts settings from a backup under a fresh identifier.
    fn insert_restored(&mut self, user_id: &str, settings: &Settings) -> Result<String, SettingsError>;
}

/// Settings manager backed by a SQLite connection.
pub struct SettingsManager<'a> {
    conn: &'a Connection,
}

impl<'a> SettingsManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_settings(row: &rusqlite::Row) -> rusqlite::Result<Settings> {
        let theme_mode: String = row.get(3)?;
        let layout_mode: String = row.get(7)?;
        let item_size: String = row.get(8)?;
        let fit_box_mode: String = row.get(9)?;
        Ok(Settings {
            id: row.get(0)?,
            user_id: row.get(1)?,
            allow_registration: row.get(2)?,
            theme: Theme {
                mode: ThemeMode::parse(&theme_mode).unwrap_or_default(),
                primary: row.get(4)?,
                accent: row.get(5)?,
                font: row.get(6)?,
            },
            layout: Layout {
                layout_mode: LayoutMode::parse(&layout_mode).unwrap_or_default(),
                item_size: ItemSize::parse(&item_size).unwrap_or_default(),
                fit_box_mode: FitBoxMode::parse(&fit_box_mode).unwrap_or_default(),
            },
            custom_css: row.get(10)?,
        })
    }

    fn insert(&self, id: &str, user_id: &str, settings: &Settings) -> Result<(), SettingsError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO settings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    SETTINGS_COLUMNS
                ),
                params![
                    id,
                    user_id,
                    settings.allow_registration,
                    settings.theme.mode.as_str(),
                    settings.theme.primary,
                    settings.theme.accent,
                    settings.theme.font,
                    settings.layout.layout_mode.as_str(),
                    settings.layout.item_size.as_str(),
                    settings.layout.fit_box_mode.as_str(),
                    settings.custom_css
                ],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    fn db_err(e: rusqlite::Error) -> SettingsError {
        SettingsError::DatabaseError(e.to_string())
    }
}

impl<'a> SettingsManagerTrait for SettingsManager<'a> {
    fn find_settings(&self, user_id: &str) -> Result<Option<Settings>, SettingsError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM settings WHERE user_id = ?1", SETTINGS_COLUMNS),
                params![user_id],
                Self::row_to_settings,
            )
            .optional()
            .map_err(Self::db_err)
    }

    fn get_or_create(&mut self, user_id: &str, allow_registration_default: bool) -> Result<Settings, SettingsError> {
        if let Some(existing) = self.find_settings(user_id)? {
            return Ok(existing);
        }
        let allowed = self.registration_allowed(allow_registration_default)?;
        let mut settings = Settings::defaults_for(user_id, allowed);
        settings.id = Uuid::new_v4().to_string();
        self.insert(&settings.id, user_id, &settings)?;
        Ok(settings)
    }

    fn update_settings(
        &mut self,
        user_id: &str,
        update: SettingsUpdate,
        allow_registration_default: bool,
    ) -> Result<Settings, SettingsError> {
        let mut settings = self.get_or_create(user_id, allow_registration_default)?;
        settings.theme = update.theme;
        settings.layout = update.layout;
        settings.custom_css = update.custom_css.unwrap_or_default();

        self.conn
            .execute(
                "UPDATE settings SET theme_mode = ?1, theme_primary = ?2, theme_accent = ?3, theme_font = ?4, \
                 layout_mode = ?5, item_size = ?6, fit_box_mode = ?7, custom_css = ?8 WHERE user_id = ?9",
                params![
                    settings.theme.mode.as_str(),
                    settings.theme.primary,
                    settings.theme.accent,
                    settings.theme.font,
                    settings.layout.layout_mode.as_str(),
                    settings.layout.item_size.as_str(),
                    settings.layout.fit_box_mode.as_str(),
                    settings.custom_css,
                    user_id
                ],
            )
            .map_err(Self::db_err)?;

        Ok(settings)
    }

    fn set_allow_registration(&mut self, allowed: bool) -> Result<(), SettingsError> {
        self.conn
            .execute("UPDATE settings SET allow_registration = ?1", params![allowed])
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Reads the flag from any row; falls back to `default` when no user has settings yet.
    fn registration_allowed(&self, default: bool) -> Result<bool, SettingsError> {
        let stored: Option<bool> = self
            .conn
            .query_row(
                "SELECT allow_registration FROM settings ORDER BY rowid LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(Self::db_err)?;
        Ok(stored.unwrap_or(default))
    }

    fn delete_for_user(&mut self, user_id: &str) -> Result<usize, SettingsError> {
        self.conn
            .execute("DELETE FROM settings WHERE user_id = ?1", params![user_id])
            .map_err(Self::db_err)
    }

    fn insert_restored(&mut self, user_id: &str, settings: &Settings) -> Result<String, SettingsError> {
        let id = Uuid::new_v4().to_string();
        self.insert(&id, user_id, settings)?;
        Ok(id)
    }
}
