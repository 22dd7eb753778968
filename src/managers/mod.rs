// bookdash managers
// Each manager is a thin SQLite-backed CRUD layer over one entity collection.

pub mod bookmark_manager;
pub mod category_manager;
pub mod settings_manager;
pub mod space_manager;
