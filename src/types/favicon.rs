use serde::{Deserialize, Serialize};

/// A persisted favicon resolution attempt for one exact target URL.
///
/// Both icon fields empty is a negative result: discovery was tried and failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaviconCacheEntry {
    pub target_url: String,
    pub icon_path: Option<String>,
    pub icon_url: Option<String>,
    pub updated_at: i64,
}

/// Outcome of favicon resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIcon {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl ResolvedIcon {
    /// The negative result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when both a file path and a public URL are present.
    pub fn is_found(&self) -> bool {
        self.icon_path.is_some() && self.icon_url.is_some()
    }
}
