//! Tests for favicon discovery and the persistent favicon cache, driven by an
//! in-memory fetcher.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use async_trait::async_trait;
use bookdash::database::Database;
use bookdash::services::favicon_service::{discover_icon_href, FaviconFetcher, FaviconService};
use bookdash::services::icon_store::IconStore;
use bookdash::types::errors::FaviconError;
use rstest::rstest;
use rusqlite::params;
use support::{test_app, MockFetcher, MockResponse};
use tempfile::TempDir;

const SITE: &str = "https://site.example/app";

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[rstest]
#[case(r#"<link rel="icon" href="/x.png">"#, "https://site.example/x.png")]
#[case(r#"<link rel="icon" href="//cdn.example/x.png">"#, "https://cdn.example/x.png")]
#[case(r#"<link rel="icon" href="x.png">"#, "https://site.example/x.png")]
#[case(r#"<LINK REL='apple-touch-icon' HREF='http://other.example/t.png' sizes="180x180">"#, "http://other.example/t.png")]
fn test_discover_icon_href_normalizes(#[case] html: &str, #[case] expected: &str) {
    assert_eq!(discover_icon_href(html, "https://site.example").as_deref(), Some(expected));
}

#[test]
fn test_discover_ignores_other_rels() {
    let html = r#"<link rel="stylesheet" href="/a.css"><link rel="shortcut icon" href="/f.ico">"#;
    assert_eq!(discover_icon_href(html, "https://site.example"), None);
}

#[tokio::test]
async fn test_resolve_prefers_favicon_ico() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new().with_bytes("https://site.example/favicon.ico", b"ICO"));

    let icon = app.favicons.resolve(SITE).await;
    assert!(icon.is_found());
    let url = icon.icon_url.unwrap();
    assert!(url.starts_with("/uploads/icons/") && url.ends_with(".ico"), "url = {}", url);
    assert_eq!(std::fs::read(icon.icon_path.unwrap()).unwrap(), b"ICO");
    assert_eq!(fetcher.requested(), vec!["https://site.example/favicon.ico".to_string()]);
}

#[tokio::test]
async fn test_resolve_falls_back_to_html_link() {
    let fetcher = MockFetcher::new()
        .with_text(SITE, r#"<html><head><link rel="icon" href="/static/logo.SVG" type="image/svg+xml"></head></html>"#)
        .with_bytes("https://site.example/static/logo.SVG", b"<svg/>");
    let (app, fetcher, _tmp) = test_app(fetcher);

    let icon = app.favicons.resolve(SITE).await;
    assert!(icon.icon_url.as_deref().unwrap_or_default().ends_with(".svg"));
    assert_eq!(
        fetcher.requested(),
        vec![
            "https://site.example/favicon.ico".to_string(),
            SITE.to_string(),
            "https://site.example/static/logo.SVG".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_empty_ico_body_counts_as_failure() {
    let fetcher = MockFetcher::new()
        .with_bytes("https://site.example/favicon.ico", b"")
        .with_text(SITE, r#"<link rel="icon" href="/i.png" sizes="32x32">"#)
        .with_bytes("https://site.example/i.png", b"PNG");
    let (app, _fetcher, _tmp) = test_app(fetcher);

    let icon = app.favicons.resolve(SITE).await;
    assert!(icon.icon_url.unwrap().ends_with(".png"));
}

#[tokio::test]
async fn test_resolve_is_cached_per_exact_url() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new().with_bytes("https://site.example/favicon.ico", b"ICO"));

    let first = app.favicons.resolve(SITE).await;
    let calls = fetcher.calls();
    let second = app.favicons.resolve(SITE).await;
    assert_eq!(first, second);
    assert_eq!(fetcher.calls(), calls, "cache hit must not touch the network");

    app.favicons.resolve("https://site.example/app/").await;
    assert!(fetcher.calls() > calls, "a different string is a different cache key");
}

#[tokio::test]
async fn test_failure_is_cached_as_negative() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());

    let icon = app.favicons.resolve(SITE).await;
    assert!(!icon.is_found());
    assert!(icon.icon_url.is_none());

    let entry = app.favicons.lookup(SITE).unwrap().expect("negative row stored");
    assert!(entry.icon_path.is_none() && entry.icon_url.is_none());

    let calls = fetcher.calls();
    app.favicons.resolve(SITE).await;
    assert_eq!(fetcher.calls(), calls);
}

#[tokio::test]
async fn test_invalid_url_resolves_empty() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    let icon = app.favicons.resolve("not a url").await;
    assert_eq!(icon, Default::default());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_refresh_replaces_negative_row() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    assert!(!app.favicons.resolve(SITE).await.is_found());

    fetcher.set("https://site.example/favicon.ico", MockResponse::Bytes(b"ICO".to_vec()));
    assert!(!app.favicons.resolve(SITE).await.is_found(), "still served from cache");
    assert!(app.favicons.refresh(SITE).await.is_found());
    assert!(app.favicons.lookup(SITE).unwrap().unwrap().icon_url.is_some());
}

#[tokio::test]
async fn test_forget_reports_row_presence() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    assert!(!app.favicons.forget(SITE).unwrap());
    app.favicons.resolve(SITE).await;
    assert!(app.favicons.forget(SITE).unwrap());
    assert!(app.favicons.lookup(SITE).unwrap().is_none());
}

#[tokio::test]
async fn test_cached_row_without_url_derives_public_url() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    {
        let conn = app.db.connection();
        conn.execute(
            "INSERT INTO favicon_cache (target_url, icon_path, icon_url, updated_at) VALUES (?1, ?2, NULL, 0)",
            params![SITE, "/srv/uploads/icons/abc.ico"],
        )
        .unwrap();
    }

    let icon = app.favicons.resolve(SITE).await;
    assert_eq!(icon.icon_url.as_deref(), Some("/uploads/icons/abc.ico"));
    assert_eq!(icon.icon_path.as_deref(), Some("/srv/uploads/icons/abc.ico"));
    assert_eq!(fetcher.calls(), 0);
}

/// Writes a cache row for the target while the download is in flight.
struct RacingFetcher {
    db: Arc<Database>,
}

#[async_trait]
impl FaviconFetcher for RacingFetcher {
    async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, FaviconError> {
        {
            let conn = self.db.connection();
            conn.execute(
                "INSERT INTO favicon_cache (target_url, icon_path, icon_url, updated_at) VALUES (?1, ?2, ?3, 1)",
                params![SITE, "/elsewhere/winner.ico", "/uploads/icons/winner.ico"],
            )
            .map_err(|e| FaviconError::NetworkError(e.to_string()))?;
        }
        Ok(b"LOSER".to_vec())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FaviconError> {
        Err(FaviconError::NetworkError(format!("unexpected {}", url)))
    }
}

#[tokio::test]
async fn test_concurrent_writer_wins_and_our_file_is_discarded() {
    let tmp = TempDir::new().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let icons = Arc::new(IconStore::new(tmp.path().join("uploads"), "/uploads", 1024));
    let fetcher = Arc::new(RacingFetcher { db: db.clone() });
    let service = FaviconService::new(db.clone(), icons.clone(), fetcher, "/uploads");

    let icon = service.resolve(SITE).await;
    assert_eq!(icon.icon_url.as_deref(), Some("/uploads/icons/winner.ico"));
    assert_eq!(icon.icon_path.as_deref(), Some("/elsewhere/winner.ico"));
    assert_eq!(file_count(&icons.legacy_dir()), 0, "losing download must be removed");

    let row_count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM favicon_cache", [], |row| row.get(0))
        .unwrap();
    assert_eq!(row_count, 1);
}
