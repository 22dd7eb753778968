//! Unit tests for the RPC handler: JSON-RPC methods dispatched by `handle_method`.
//!
//! These tests exercise the methods through the same code path used by the
//! `bookdash-rpc` binary, with an in-memory database and a canned favicon
//! fetcher.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;

use bookdash::app::App;
use bookdash::database::Database;
use bookdash::rpc_handler::{base64_decode, base64_encode, handle_method};
use bookdash::services::favicon_service::FaviconFetcher;
use bookdash::types::errors::FaviconError;
use support::{test_app, test_config, MockFetcher};

async fn call(app: &App, method: &str, params: Value) -> Value {
    handle_method(app, method, &params)
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
}

/// Creates a space and a category for `u1`, returning their ids.
async fn space_and_category(app: &App) -> (String, String) {
    let space = call(app, "space.create", json!({"userId": "u1", "name": "Home"})).await;
    let sid = space["space"]["id"].as_str().unwrap().to_string();
    let cat = call(app, "category.create", json!({"userId": "u1", "spaceId": sid, "name": "Media"})).await;
    (sid, cat["category"]["id"].as_str().unwrap().to_string())
}

// ─── Ping ───

#[tokio::test]
async fn test_ping() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let res = call(&app, "ping", json!({})).await;
    assert_eq!(res["pong"], json!(true));
    assert_eq!(res["version"], json!(env!("CARGO_PKG_VERSION")));
}

// ─── Errors ───

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let res = handle_method(&app, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

#[tokio::test]
async fn test_data_methods_require_user_id() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    for method in ["space.list", "category.list", "bookmark.list", "settings.get", "backup.create"] {
        let res = handle_method(&app, method, &json!({})).await;
        assert_eq!(res.unwrap_err(), "missing userId", "method = {}", method);
        let res = handle_method(&app, method, &json!({"userId": ""})).await;
        assert!(res.is_err(), "empty userId accepted by {}", method);
    }
}

// ─── Spaces and categories ───

#[tokio::test]
async fn test_space_crud() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let created = call(&app, "space.create", json!({"userId": "u1", "name": "Home", "icon": "🏠"})).await;
    let id = created["space"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["space"]["order"], json!(0));

    let updated = call(&app, "space.update", json!({"userId": "u1", "id": id, "name": "House"})).await;
    assert_eq!(updated["space"]["name"], json!("House"));
    assert_eq!(updated["space"]["icon"], json!("🏠"));

    let listed = call(&app, "space.list", json!({"userId": "u1"})).await;
    assert_eq!(listed["spaces"].as_array().unwrap().len(), 1);
    assert!(call(&app, "space.list", json!({"userId": "u2"})).await["spaces"].as_array().unwrap().is_empty());

    assert!(handle_method(&app, "space.get", &json!({"userId": "u2", "id": id})).await.is_err());
    call(&app, "space.delete", json!({"userId": "u1", "id": id})).await;
    assert!(handle_method(&app, "space.get", &json!({"userId": "u1", "id": id})).await.is_err());
}

#[tokio::test]
async fn test_category_list_filters_by_space() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    let other = call(&app, "space.create", json!({"userId": "u1", "name": "Work"})).await;
    let other_id = other["space"]["id"].as_str().unwrap();
    call(&app, "category.create", json!({"userId": "u1", "spaceId": other_id, "name": "Tools"})).await;

    let all = call(&app, "category.list", json!({"userId": "u1"})).await;
    assert_eq!(all["categories"].as_array().unwrap().len(), 2);
    let scoped = call(&app, "category.list", json!({"userId": "u1", "spaceId": sid})).await;
    assert_eq!(scoped["categories"][0]["id"], json!(cid));
    assert_eq!(scoped["categories"].as_array().unwrap().len(), 1);

    let updated = call(&app, "category.update", json!({"userId": "u1", "id": cid, "numRows": 4, "sortBy": "name"})).await;
    assert_eq!(updated["category"]["numRows"], json!(4));
    let err = handle_method(&app, "category.update", &json!({"userId": "u1", "id": cid, "numRows": 11}))
        .await
        .unwrap_err();
    assert!(err.contains("Invalid category"), "err = {}", err);
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_bookmark_create_resolves_favicon() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new().with_bytes("https://jf.example/favicon.ico", b"ICO"));
    let (sid, cid) = space_and_category(&app).await;

    let res = call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "Jellyfin", "serviceUrl": "https://jf.example"}),
    )
    .await;
    let bookmark = &res["bookmark"];
    assert_eq!(bookmark["iconIsUploaded"], json!(false));
    assert!(bookmark["iconUrl"].as_str().unwrap().starts_with("/uploads/icons/"));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_bookmark_create_with_explicit_icon_is_uploaded() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;

    let res = call(
        &app,
        "bookmark.create",
        json!({
            "userId": "u1", "spaceId": sid, "categoryId": cid, "title": "Mine",
            "serviceUrl": "https://mine.example", "iconUrl": "/uploads/spaces/Home/Media/Mine.png",
            "iconIsUploaded": false
        }),
    )
    .await;
    assert_eq!(res["bookmark"]["iconIsUploaded"], json!(true));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_bookmark_create_rejects_invalid_url() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    let res = handle_method(
        &app,
        "bookmark.create",
        &json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "x", "serviceUrl": "nope"}),
    )
    .await;
    assert!(res.unwrap_err().contains("Invalid bookmark URL"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_bookmark_update_null_icon_re_resolves() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new().with_bytes("https://jf.example/favicon.ico", b"ICO"));
    let (sid, cid) = space_and_category(&app).await;
    let created = call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "J", "serviceUrl": "https://jf.example",
               "iconUrl": "/uploads/spaces/Home/Media/J.png"}),
    )
    .await;
    let id = created["bookmark"]["id"].as_str().unwrap().to_string();

    let res = call(&app, "bookmark.update", json!({"userId": "u1", "id": id, "iconUrl": null})).await;
    assert_eq!(res["bookmark"]["iconIsUploaded"], json!(false));
    assert!(res["bookmark"]["iconUrl"].as_str().unwrap().starts_with("/uploads/icons/"));
}

#[tokio::test]
async fn test_bookmark_update_null_icon_without_favicon_clears() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    let created = call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "J", "serviceUrl": "https://dark.example",
               "iconUrl": "/uploads/spaces/Home/Media/J.png"}),
    )
    .await;
    let id = created["bookmark"]["id"].as_str().unwrap().to_string();

    let res = call(&app, "bookmark.update", json!({"userId": "u1", "id": id, "iconPath": null})).await;
    assert!(res["bookmark"].get("iconUrl").is_none());
    assert_eq!(res["bookmark"]["iconIsUploaded"], json!(false));
}

#[tokio::test]
async fn test_bookmark_update_new_url_resolves_new_icon() {
    let fetcher = MockFetcher::new().with_bytes("https://new.example/favicon.ico", b"NEW");
    let (app, _fetcher, _tmp) = test_app(fetcher);
    let (sid, cid) = space_and_category(&app).await;
    let created = call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "J", "serviceUrl": "https://old.example"}),
    )
    .await;
    assert!(created["bookmark"].get("iconUrl").is_none());
    let id = created["bookmark"]["id"].as_str().unwrap().to_string();

    let res = call(&app, "bookmark.update", json!({"userId": "u1", "id": id, "serviceUrl": "https://new.example"})).await;
    let path = res["bookmark"]["iconPath"].as_str().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"NEW");
}

#[tokio::test]
async fn test_bookmark_list_fills_missing_icons() {
    let (app, fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "Later", "serviceUrl": "https://later.example"}),
    )
    .await;

    // The negative result is cached, so a site that gains an icon needs a refresh.
    fetcher.set("https://later.example/favicon.ico", support::MockResponse::Bytes(b"ICO".to_vec()));
    app.favicons.forget("https://later.example").unwrap();

    let listed = call(&app, "bookmark.list", json!({"userId": "u1", "categoryId": cid})).await;
    assert!(listed["bookmarks"][0]["iconUrl"].as_str().is_some());

    let again = call(&app, "bookmark.get", json!({"userId": "u1", "id": listed["bookmarks"][0]["id"]})).await;
    assert!(again["bookmark"]["iconPath"].as_str().is_some(), "resolved icon is persisted");
}

#[tokio::test]
async fn test_reorder_bookmarks() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    let mut ids = Vec::new();
    for title in ["A", "B", "C"] {
        let res = call(
            &app,
            "bookmark.create",
            json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": title, "serviceUrl": "https://x.example",
                   "iconUrl": "/uploads/x.png"}),
        )
        .await;
        ids.push(res["bookmark"]["id"].as_str().unwrap().to_string());
    }

    call(
        &app,
        "reorder",
        json!({"userId": "u1", "entity": "bookmark", "items": [
            {"id": ids[2], "order": 0}, {"id": ids[0], "order": 1}, {"id": ids[1], "order": 2}
        ]}),
    )
    .await;
    let listed = call(&app, "bookmark.list", json!({"userId": "u1", "categoryId": cid})).await;
    let titles: Vec<&str> = listed["bookmarks"].as_array().unwrap().iter().map(|b| b["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["C", "A", "B"]);

    let bad = handle_method(&app, "reorder", &json!({"userId": "u1", "entity": "tab", "items": []})).await;
    assert_eq!(bad.unwrap_err(), "invalid entity");
}

// ─── Settings ───

#[tokio::test]
async fn test_settings_get_and_update() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let defaults = call(&app, "settings.get", json!({"userId": "u1"})).await;
    assert_eq!(defaults["settings"]["theme"]["mode"], json!("dark"));
    assert_eq!(defaults["settings"]["layout"]["fitBoxMode"], json!("auto"));

    let updated = call(
        &app,
        "settings.update",
        json!({
            "userId": "u1",
            "theme": {"mode": "light", "primary": "#000000", "accent": "#ffffff", "font": "Roboto"},
            "layout": {"layoutMode": "horizontal", "itemSize": "large", "fitBoxMode": "fit"},
            "customCss": ".tile { border: 0 }"
        }),
    )
    .await;
    assert_eq!(updated["settings"]["theme"]["font"], json!("Roboto"));
    assert_eq!(updated["settings"]["customCss"], json!(".tile { border: 0 }"));

    let bad = handle_method(&app, "settings.update", &json!({"userId": "u1", "theme": {"mode": "neon"}})).await;
    assert!(bad.unwrap_err().starts_with("invalid params"));
}

#[tokio::test]
async fn test_registration_flag() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    assert_eq!(call(&app, "registration.get", json!({})).await["allowRegistration"], json!(false));

    call(&app, "settings.get", json!({"userId": "u1"})).await;
    call(&app, "registration.set", json!({"allowRegistration": true})).await;
    assert_eq!(call(&app, "registration.get", json!({})).await["allowRegistration"], json!(true));
    assert!(handle_method(&app, "registration.set", &json!({})).await.is_err());
}

// ─── Icons ───

#[tokio::test]
async fn test_icon_upload_and_delete() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;

    let stored = call(
        &app,
        "icon.upload",
        json!({"userId": "u1", "type": "bookmark", "spaceId": sid, "categoryId": cid,
               "bookmarkTitle": "Jelly Fin", "fileName": "logo.png", "data": base64_encode(b"PNG")}),
    )
    .await;
    assert_eq!(stored["iconUrl"], json!("/uploads/spaces/Home/Media/Jelly_Fin.png"));

    let missing_category = handle_method(
        &app,
        "icon.upload",
        &json!({"userId": "u1", "type": "category", "spaceId": sid, "fileName": "c.png", "data": base64_encode(b"x")}),
    )
    .await;
    assert!(missing_category.unwrap_err().contains("categoryId"));

    let bad_type = handle_method(
        &app,
        "icon.upload",
        &json!({"userId": "u1", "type": "space", "spaceId": sid, "fileName": "c.bmp", "data": base64_encode(b"x")}),
    )
    .await;
    assert!(bad_type.is_err());

    let fetched = app.icons.save_fetched_icon(b"ICO", "ico").unwrap();
    let name = fetched.icon_url.rsplit('/').next().unwrap();
    call(&app, "icon.delete", json!({"fileName": name})).await;
    assert!(handle_method(&app, "icon.delete", &json!({"fileName": "../data.db"})).await.is_err());
}

#[tokio::test]
async fn test_favicon_resolve_method() {
    let (app, _fetcher, _tmp) = test_app(MockFetcher::new().with_bytes("https://a.example/favicon.ico", b"ICO"));
    let found = call(&app, "favicon.resolve", json!({"url": "https://a.example"})).await;
    assert!(found["iconUrl"].as_str().is_some());
    let none = call(&app, "favicon.resolve", json!({"url": "https://b.example"})).await;
    assert_eq!(none, json!({}));
}

// ─── Backup ───

#[tokio::test]
async fn test_backup_create_inspect_restore() {
    let (app, _fetcher, tmp) = test_app(MockFetcher::new());
    let (sid, cid) = space_and_category(&app).await;
    call(
        &app,
        "bookmark.create",
        json!({"userId": "u1", "spaceId": sid, "categoryId": cid, "title": "Docs", "serviceUrl": "https://docs.example",
               "iconUrl": "/uploads/docs.png"}),
    )
    .await;

    let backup = call(&app, "backup.create", json!({"userId": "u1"})).await;
    assert_eq!(backup["contentType"], json!("application/zip"));
    assert!(backup["filename"].as_str().unwrap().ends_with(".zip"));

    let data = backup["data"].as_str().unwrap();
    let summary = call(&app, "backup.inspect", json!({"data": data})).await;
    assert_eq!(summary["spaces"], json!(1));
    assert_eq!(summary["bookmarks"], json!(1));

    let upload = tmp.path().join("restore.zip");
    std::fs::write(&upload, base64_decode(data).unwrap()).unwrap();
    let restored = call(
        &app,
        "backup.restore",
        json!({"userId": "u2", "path": upload.to_string_lossy(), "repair": "drop"}),
    )
    .await;
    assert_eq!(restored["ok"], json!(true));
    assert_eq!(restored["report"]["bookmarks"], json!(1));
    assert!(!upload.exists(), "uploaded archive is removed after restore");

    let spaces = call(&app, "space.list", json!({"userId": "u2"})).await;
    assert_eq!(spaces["spaces"][0]["name"], json!("Home"));
}

#[tokio::test]
async fn test_backup_restore_invalid_archive_removes_upload() {
    let (app, _fetcher, tmp) = test_app(MockFetcher::new());
    let upload = tmp.path().join("bad.zip");
    std::fs::write(&upload, b"not a zip").unwrap();

    let res = handle_method(&app, "backup.restore", &json!({"userId": "u1", "path": upload.to_string_lossy()})).await;
    assert!(res.unwrap_err().starts_with("Invalid backup"));
    assert!(!upload.exists());

    let bad_repair = handle_method(
        &app,
        "backup.restore",
        &json!({"userId": "u1", "path": upload.to_string_lossy(), "repair": "ignore"}),
    )
    .await;
    assert_eq!(bad_repair.unwrap_err(), "invalid repair strategy");
}

// ─── Concurrency ───

/// Fetcher whose `/favicon.ico` request hangs until the gate opens.
struct GatedFetcher {
    gate: Arc<Notify>,
}

#[async_trait]
impl FaviconFetcher for GatedFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FaviconError> {
        self.gate.notified().await;
        Err(FaviconError::NetworkError(format!("timed out fetching {}", url)))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FaviconError> {
        Err(FaviconError::NetworkError(format!("timed out fetching {}", url)))
    }
}

#[tokio::test]
async fn test_slow_favicon_fetch_does_not_block_other_requests() {
    let tmp = TempDir::new().unwrap();
    let gate = Arc::new(Notify::new());
    let db = Database::open_in_memory().unwrap();
    let fetcher = Arc::new(GatedFetcher { gate: gate.clone() });
    let app = Arc::new(App::with_database(test_config(&tmp), db, fetcher));
    let (sid, cid) = space_and_category(&app).await;

    let pending = tokio::spawn({
        let app = Arc::clone(&app);
        let params = json!({
            "userId": "u1", "spaceId": sid, "categoryId": cid,
            "title": "Slow", "serviceUrl": "https://slow.example"
        });
        async move { handle_method(&app, "bookmark.create", &params).await }
    });
    tokio::task::yield_now().await;

    let listed = tokio::time::timeout(Duration::from_secs(2), call(&app, "space.list", json!({"userId": "u1"})))
        .await
        .expect("space.list waited on another request's favicon fetch");
    assert_eq!(listed["spaces"].as_array().unwrap().len(), 1);
    assert!(!pending.is_finished());

    gate.notify_one();
    let created = pending.await.unwrap().unwrap();
    assert_eq!(created["bookmark"]["title"], json!("Slow"));
    assert_eq!(created["bookmark"]["iconIsUploaded"], json!(false));
}
