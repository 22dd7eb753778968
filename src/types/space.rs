use serde::{Deserialize, Serialize};

use super::icon::IconChange;

pub const DEFAULT_SPACE_ICON: &str = "🌐";

fn default_space_icon() -> String {
    DEFAULT_SPACE_ICON.to_string()
}

/// A top-level grouping of categories owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default = "default_space_icon")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub order: i64,
}

/// Fields accepted when creating a space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSpace {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub icon_path: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// Partial update of a space. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SpaceUpdate {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub icon_change: IconChange,
}
