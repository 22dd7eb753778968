//! Favicon Service for bookdash.
//!
//! Resolves a bookmark's service URL to a stored icon file. Every attempt,
//! including total failure, is recorded in `favicon_cache` keyed by the exact
//! target URL, so each URL hits the network at most once.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::services::icon_store::{IconStore, LEGACY_ICONS_DIR};
use crate::types::config::ServerConfig;
use crate::types::errors::FaviconError;
use crate::types::favicon::{FaviconCacheEntry, ResolvedIcon};
use crate::types::icon::StoredIcon;

/// Outbound HTTP used by favicon discovery.
#[async_trait]
pub trait FaviconFetcher: Send + Sync {
    /// GETs `url` and returns the body. Error statuses are errors.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FaviconError>;
    /// GETs `url` and returns the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FaviconError>;
}

/// `reqwest`-backed fetcher with a per-request timeout.
pub struct HttpFaviconFetcher {
    client: reqwest::Client,
}

impl HttpFaviconFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FaviconError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FaviconError::NetworkError(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, FaviconError> {
        Self::new(Duration::from_secs(config.fetch_timeout_secs), &config.user_agent)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FaviconError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FaviconError::NetworkError(e.to_string()))?;

        if response.status().as_u16() >= 400 {
            return Err(FaviconError::NetworkError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl FaviconFetcher for HttpFaviconFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FaviconError> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| FaviconError::NetworkError(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FaviconError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| FaviconError::NetworkError(e.to_string()))
    }
}

fn link_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)<link[^>]+rel=["'](?:apple-touch-icon|icon)["'][^>]+>"#).ok())
        .as_ref()
}

fn href_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)href=["']([^"']+)["']"#).ok())
        .as_ref()
}

/// Finds the first icon link in `html` and returns its absolute URL.
///
/// Only `rel="icon"` and `rel="apple-touch-icon"` are recognized, and the tag
/// must carry an attribute after `rel`. Hrefs are normalized against `origin`:
/// `http...` is kept, `//host/x` gets `https:`, `/x` and bare `x` are joined
/// to the origin.
pub fn discover_icon_href(html: &str, origin: &str) -> Option<String> {
    let tag = link_tag_pattern()?.find(html)?;
    let href = href_pattern()?.captures(tag.as_str())?.get(1)?.as_str();

    let resolved = if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    };
    Some(resolved)
}

/// File extension for an icon downloaded from `url`; `png` when the last path
/// segment has none.
pub fn extension_from_url(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "png".to_string(),
    }
}

/// `scheme://host[:port]` of an http(s) URL.
fn origin_of(target_url: &str) -> Result<String, FaviconError> {
    let parsed = reqwest::Url::parse(target_url)
        .map_err(|_| FaviconError::InvalidUrl(target_url.to_string()))?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return Err(FaviconError::InvalidUrl(target_url.to_string()));
    }
    Ok(origin.ascii_serialization())
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Favicon resolution with a persistent, never-expiring cache.
pub struct FaviconService {
    db: Arc<Database>,
    icons: Arc<IconStore>,
    fetcher: Arc<dyn FaviconFetcher>,
    public_prefix: String,
}

impl FaviconService {
    pub fn new(
        db: Arc<Database>,
        icons: Arc<IconStore>,
        fetcher: Arc<dyn FaviconFetcher>,
        public_prefix: &str,
    ) -> Self {
        Self {
            db,
            icons,
            fetcher,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves `target_url` to an icon. Never fails; an empty result means no icon.
    ///
    /// A cached row answers immediately, negative rows included.
    pub async fn resolve(&self, target_url: &str) -> ResolvedIcon {
        match self.lookup(target_url) {
            Ok(Some(entry)) => return self.cached_result(&entry),
            Ok(None) => {}
            Err(e) => {
                warn!(target_url, error = %e, "favicon cache lookup failed");
                return ResolvedIcon::empty();
            }
        }

        let stored = match self.fetch_favicon_ico(target_url).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                debug!(target_url, error = %e, "favicon.ico step failed");
                match self.fetch_from_html(target_url).await {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        debug!(target_url, error = %e, "html discovery step failed");
                        None
                    }
                }
            }
        };

        if stored.is_none() {
            info!(target_url, "no favicon found, caching negative result");
        }
        match self.record(target_url, stored) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(target_url, error = %e, "failed to write favicon cache");
                ResolvedIcon::empty()
            }
        }
    }

    /// Drops the cached row and resolves again.
    pub async fn refresh(&self, target_url: &str) -> ResolvedIcon {
        if let Err(e) = self.forget(target_url) {
            warn!(target_url, error = %e, "failed to clear favicon cache row");
        }
        self.resolve(target_url).await
    }

    /// Reads the cache row for the exact target URL.
    pub fn lookup(&self, target_url: &str) -> Result<Option<FaviconCacheEntry>, rusqlite::Error> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT target_url, icon_path, icon_url, updated_at FROM favicon_cache WHERE target_url = ?1",
            params![target_url],
            |row| {
                Ok(FaviconCacheEntry {
                    target_url: row.get(0)?,
                    icon_path: row.get(1)?,
                    icon_url: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    /// Deletes the cache row for `target_url`. Returns whether a row existed.
    pub fn forget(&self, target_url: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.db.connection();
        let affected = conn.execute(
            "DELETE FROM favicon_cache WHERE target_url = ?1",
            params![target_url],
        )?;
        Ok(affected > 0)
    }

    fn cached_result(&self, entry: &FaviconCacheEntry) -> ResolvedIcon {
        let icon_url = entry.icon_url.clone().or_else(|| {
            entry.icon_path.as_deref().and_then(|p| {
                Path::new(p)
                    .file_name()
                    .map(|name| {
                        format!("{}/{}/{}", self.public_prefix, LEGACY_ICONS_DIR, name.to_string_lossy())
                    })
            })
        });
        ResolvedIcon {
            icon_path: entry.icon_path.clone(),
            icon_url,
        }
    }

    /// Writes the outcome unless another resolver got there first, in which
    /// case the stored row wins and our file is discarded.
    fn record(&self, target_url: &str, stored: Option<StoredIcon>) -> Result<ResolvedIcon, rusqlite::Error> {
        let (path, url) = match &stored {
            Some(s) => (Some(s.icon_path.as_str()), Some(s.icon_url.as_str())),
            None => (None, None),
        };

        let inserted = {
            let conn = self.db.connection();
            conn.execute(
                "INSERT OR IGNORE INTO favicon_cache (target_url, icon_path, icon_url, updated_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![target_url, path, url, now()],
            )?
        };

        if inserted > 0 {
            return Ok(ResolvedIcon {
                icon_path: path.map(str::to_string),
                icon_url: url.map(str::to_string),
            });
        }

        debug!(target_url, "favicon cache row already present, keeping stored result");
        if let Some(s) = &stored {
            self.icons.discard(&s.icon_path);
        }
        Ok(self
            .lookup(target_url)?
            .map(|entry| self.cached_result(&entry))
            .unwrap_or_default())
    }

    async fn fetch_favicon_ico(&self, target_url: &str) -> Result<StoredIcon, FaviconError> {
        let origin = origin_of(target_url)?;
        let ico_url = format!("{}/favicon.ico", origin);
        let bytes = self.fetcher.fetch_bytes(&ico_url).await?;
        if bytes.is_empty() {
            return Err(FaviconError::EmptyResponse(ico_url));
        }
        self.icons
            .save_fetched_icon(&bytes, "ico")
            .map_err(|e| FaviconError::StorageError(e.to_string()))
    }

    async fn fetch_from_html(&self, target_url: &str) -> Result<StoredIcon, FaviconError> {
        let origin = origin_of(target_url)?;
        let html = self.fetcher.fetch_text(target_url).await?;
        if html.is_empty() {
            return Err(FaviconError::EmptyResponse(target_url.to_string()));
        }
        let icon_url = discover_icon_href(&html, &origin)
            .ok_or_else(|| FaviconError::EmptyResponse(format!("no icon link in {}", target_url)))?;

        let bytes = self.fetcher.fetch_bytes(&icon_url).await?;
        if bytes.is_empty() {
            return Err(FaviconError::EmptyResponse(icon_url));
        }
        self.icons
            .save_fetched_icon(&bytes, &extension_from_url(&icon_url))
            .map_err(|e| FaviconError::StorageError(e.to_string()))
    }
}
