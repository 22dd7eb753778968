use serde::{Deserialize, Serialize};

use super::icon::IconChange;

pub const DEFAULT_CATEGORY_ICON: &str = "📁";
pub const DEFAULT_SORT_BY: &str = "custom";
pub const MIN_ROWS: i64 = 1;
pub const MAX_ROWS: i64 = 10;

fn default_category_icon() -> String {
    DEFAULT_CATEGORY_ICON.to_string()
}

fn default_sort_by() -> String {
    DEFAULT_SORT_BY.to_string()
}

fn default_num_rows() -> i64 {
    MIN_ROWS
}

/// A named group of bookmarks inside one space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub space_id: String,
    pub name: String,
    #[serde(default = "default_category_icon")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_num_rows")]
    pub num_rows: i64,
    #[serde(default)]
    pub order: i64,
}

/// Fields accepted when creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub space_id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub icon_path: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub num_rows: Option<i64>,
}

/// Partial update of a category. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub sort_by: Option<String>,
    pub num_rows: Option<i64>,
    pub icon_change: IconChange,
}
