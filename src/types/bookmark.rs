use chrono::DateTime;
use serde::{de, Deserialize, Deserializer, Serialize};

use super::icon::IconChange;

/// How the dashboard opens a bookmark when clicked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpeningMethod {
    #[default]
    SameTab,
    NewTab,
    Iframe,
}

impl OpeningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpeningMethod::SameTab => "same-tab",
            OpeningMethod::NewTab => "new-tab",
            OpeningMethod::Iframe => "iframe",
        }
    }

    /// Parses the stored form. Unknown values fall back to `same-tab`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "new-tab" => OpeningMethod::NewTab,
            "iframe" => OpeningMethod::Iframe,
            _ => OpeningMethod::SameTab,
        }
    }
}

/// A saved link inside one category of one space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub category_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// `true` when the user supplied the icon; automatic resolution must not replace it.
    #[serde(default)]
    pub icon_is_uploaded: bool,
    pub service_url: String,
    #[serde(default)]
    pub opening_method: OpeningMethod,
    #[serde(default)]
    pub order: i64,
    /// UNIX seconds.
    #[serde(default, deserialize_with = "deserialize_created_at")]
    pub created_at: i64,
}

/// Reads `createdAt` as UNIX seconds, an RFC 3339 string, or a `{"$date": ...}`
/// wrapper around one. Older backups store the date as a string. `null` reads as 0.
fn deserialize_created_at<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Seconds(i64),
        Text(String),
        Wrapped {
            #[serde(rename = "$date")]
            date: String,
        },
    }

    let text = match Option::<Timestamp>::deserialize(deserializer)? {
        None => return Ok(0),
        Some(Timestamp::Seconds(secs)) => return Ok(secs),
        Some(Timestamp::Text(text)) | Some(Timestamp::Wrapped { date: text }) => text,
    };
    DateTime::parse_from_rfc3339(&text)
        .map(|date| date.timestamp())
        .map_err(|e| de::Error::custom(format!("invalid createdAt {:?}: {}", text, e)))
}

/// Fields accepted when creating a bookmark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookmark {
    pub space_id: String,
    pub category_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub service_url: String,
    #[serde(default)]
    pub opening_method: Option<OpeningMethod>,
    #[serde(default)]
    pub icon_path: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub icon_is_uploaded: bool,
}

/// Partial update of a bookmark. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BookmarkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub service_url: Option<String>,
    pub opening_method: Option<OpeningMethod>,
    pub space_id: Option<String>,
    pub category_id: Option<String>,
    pub icon_change: IconChange,
    pub icon_is_uploaded: Option<bool>,
}
