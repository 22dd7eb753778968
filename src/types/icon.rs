use serde::{Deserialize, Serialize};

/// How an update treats an entity's stored icon file reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum IconChange {
    /// Leave `iconPath`/`iconUrl` as they are.
    #[default]
    Keep,
    /// Replace the icon reference. Either half may be absent.
    Set {
        path: Option<String>,
        url: Option<String>,
    },
    /// Unset both `iconPath` and `iconUrl`.
    Remove,
}

impl IconChange {
    /// Builds an icon change from raw JSON update fields.
    ///
    /// An explicit `null` on either field means removal; a string on either
    /// field means replacement; absence of both means keep.
    pub fn from_json(params: &serde_json::Value) -> Self {
        let path = params.get("iconPath");
        let url = params.get("iconUrl");
        let is_null = |v: Option<&serde_json::Value>| matches!(v, Some(serde_json::Value::Null));
        if is_null(path) || is_null(url) {
            return IconChange::Remove;
        }
        let path = path.and_then(|v| v.as_str()).map(str::to_string);
        let url = url.and_then(|v| v.as_str()).map(str::to_string);
        if path.is_none() && url.is_none() {
            IconChange::Keep
        } else {
            IconChange::Set { path, url }
        }
    }
}

/// Where an uploaded icon belongs in the hierarchical icon layout.
#[derive(Debug, Clone)]
pub enum UploadTarget {
    /// `spaces/{space}/space.{ext}`
    Space { space_name: String },
    /// `spaces/{space}/{category}/category.{ext}`
    Category {
        space_name: String,
        category_name: String,
    },
    /// `spaces/{space}/{category}/{title}.{ext}`, or a random name without a title.
    Bookmark {
        space_name: String,
        category_name: String,
        title: Option<String>,
    },
}

/// A file written to the icon store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIcon {
    pub icon_path: String,
    pub icon_url: String,
}
