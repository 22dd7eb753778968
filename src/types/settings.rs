use serde::{Deserialize, Serialize};

/// Dashboard colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
    Custom,
}

/// Direction in which categories are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Auto,
    Vertical,
    Horizontal,
}

/// Bookmark tile size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Whether category boxes size to content or fit the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitBoxMode {
    #[default]
    Auto,
    Fit,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($s => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

str_enum!(ThemeMode { Light => "light", Dark => "dark", Custom => "custom" });
str_enum!(LayoutMode { Auto => "auto", Vertical => "vertical", Horizontal => "horizontal" });
str_enum!(ItemSize { Small => "small", Medium => "medium", Large => "large" });
str_enum!(FitBoxMode { Auto => "auto", Fit => "fit" });

/// Theme settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(default)]
    pub mode: ThemeMode,
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    #[serde(default = "default_font")]
    pub font: String,
}

fn default_primary() -> String {
    "#16a34a".to_string()
}

fn default_accent() -> String {
    "#facc15".to_string()
}

fn default_font() -> String {
    "Inter".to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            primary: default_primary(),
            accent: default_accent(),
            font: default_font(),
        }
    }
}

/// Layout settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub layout_mode: LayoutMode,
    #[serde(default)]
    pub item_size: ItemSize,
    #[serde(default)]
    pub fit_box_mode: FitBoxMode,
}

/// Per-user dashboard settings. Exactly one row exists per user once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    /// Global "allow public registration" flag, mirrored on every user's row.
    #[serde(default)]
    pub allow_registration: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub custom_css: String,
}

impl Settings {
    /// Default settings for `user_id`, not yet persisted.
    pub fn defaults_for(user_id: &str, allow_registration: bool) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            allow_registration,
            theme: Theme::default(),
            layout: Layout::default(),
            custom_css: String::new(),
        }
    }
}

/// Fields accepted by a settings update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub theme: Theme,
    pub layout: Layout,
    #[serde(default)]
    pub custom_css: Option<String>,
}
