//! RPC method handler for the bookdash JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches JSON-RPC method calls to the managers and
//! services held by [`App`]. Every data method takes a `userId` parameter and
//! only touches that user's rows.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, warn};

use crate::app::App;
use crate::managers::bookmark_manager::{validate_service_url, BookmarkManager, BookmarkManagerTrait};
use crate::managers::category_manager::{CategoryManager, CategoryManagerTrait};
use crate::managers::settings_manager::{SettingsManager, SettingsManagerTrait};
use crate::managers::space_manager::{SpaceManager, SpaceManagerTrait};
use crate::services::backup_service::{BackupService, BACKUP_CONTENT_TYPE, BACKUP_FILENAME};
use crate::types::backup::{RepairStrategy, RestoreOptions};
use crate::types::bookmark::{Bookmark, BookmarkUpdate, NewBookmark, OpeningMethod};
use crate::types::category::{CategoryUpdate, NewCategory};
use crate::types::icon::{IconChange, UploadTarget};
use crate::types::ordering::{OrderUpdate, ReorderEntity};
use crate::types::settings::SettingsUpdate;
use crate::types::space::{NewSpace, SpaceUpdate};

/// Encode bytes to base64 string.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode base64 string to bytes.
pub fn base64_decode(input: &str) -> Result<Vec<u8>, String> {
    BASE64.decode(input).map_err(|e| format!("base64 decode error: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn parse<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, String> {
    serde_json::from_value(params.clone()).map_err(|e| format!("invalid params: {}", e))
}

fn user_id(params: &Value) -> Result<&str, String> {
    params
        .get("userId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing userId".to_string())
}

fn opt_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Spaces ───
        "space.list" => {
            let user = user_id(params)?;
            let conn = app.db.connection();
            let spaces = SpaceManager::new(&conn).list_spaces(user).map_err(|e| e.to_string())?;
            Ok(json!({"spaces": to_json(&spaces)?}))
        }
        "space.get" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            let space = SpaceManager::new(&conn).get_space(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"space": to_json(&space)?}))
        }
        "space.create" => {
            let user = user_id(params)?;
            let new: NewSpace = parse(params)?;
            let conn = app.db.connection();
            let space = SpaceManager::new(&conn).create_space(user, new).map_err(|e| e.to_string())?;
            Ok(json!({"space": to_json(&space)?}))
        }
        "space.update" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let update = SpaceUpdate {
                name: opt_str(params, "name"),
                icon: opt_str(params, "icon"),
                icon_change: IconChange::from_json(params),
            };
            let conn = app.db.connection();
            let space = SpaceManager::new(&conn)
                .update_space(user, id, update)
                .map_err(|e| e.to_string())?;
            Ok(json!({"space": to_json(&space)?}))
        }
        "space.delete" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            SpaceManager::new(&conn).delete_space(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Categories ───
        "category.list" => {
            let user = user_id(params)?;
            let conn = app.db.connection();
            let mgr = CategoryManager::new(&conn);
            let categories = match params.get("spaceId").and_then(|v| v.as_str()) {
                Some(space_id) => mgr.list_in_space(user, space_id),
                None => mgr.list_categories(user),
            }
            .map_err(|e| e.to_string())?;
            Ok(json!({"categories": to_json(&categories)?}))
        }
        "category.get" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            let category = CategoryManager::new(&conn).get_category(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"category": to_json(&category)?}))
        }
        "category.create" => {
            let user = user_id(params)?;
            let new: NewCategory = parse(params)?;
            let conn = app.db.connection();
            let category = CategoryManager::new(&conn)
                .create_category(user, new)
                .map_err(|e| e.to_string())?;
            Ok(json!({"category": to_json(&category)?}))
        }
        "category.update" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let update = CategoryUpdate {
                name: opt_str(params, "name"),
                icon: opt_str(params, "icon"),
                sort_by: opt_str(params, "sortBy"),
                num_rows: params.get("numRows").and_then(|v| v.as_i64()),
                icon_change: IconChange::from_json(params),
            };
            let conn = app.db.connection();
            let category = CategoryManager::new(&conn)
                .update_category(user, id, update)
                .map_err(|e| e.to_string())?;
            Ok(json!({"category": to_json(&category)?}))
        }
        "category.delete" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            CategoryManager::new(&conn).delete_category(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmark.list" => {
            let user = user_id(params)?;
            let category_id = params.get("categoryId").and_then(|v| v.as_str());
            let bookmarks = list_bookmarks(app, user, category_id).await?;
            Ok(json!({"bookmarks": to_json(&bookmarks)?}))
        }
        "bookmark.get" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            let bookmark = BookmarkManager::new(&conn).get_bookmark(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"bookmark": to_json(&bookmark)?}))
        }
        "bookmark.create" => {
            let user = user_id(params)?;
            let new: NewBookmark = parse(params)?;
            let bookmark = create_bookmark(app, user, new).await?;
            Ok(json!({"bookmark": to_json(&bookmark)?}))
        }
        "bookmark.update" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let bookmark = update_bookmark(app, user, id, params).await?;
            Ok(json!({"bookmark": to_json(&bookmark)?}))
        }
        "bookmark.delete" => {
            let user = user_id(params)?;
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let conn = app.db.connection();
            BookmarkManager::new(&conn).delete_bookmark(user, id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Ordering ───
        "reorder" => {
            let user = user_id(params)?;
            let entity: ReorderEntity = params
                .get("entity")
                .cloned()
                .ok_or("missing entity")
                .and_then(|v| serde_json::from_value(v).map_err(|_| "invalid entity"))?;
            let items: Vec<OrderUpdate> = params
                .get("items")
                .cloned()
                .ok_or("missing items")
                .and_then(|v| serde_json::from_value(v).map_err(|_| "invalid items"))?;
            let conn = app.db.connection();
            match entity {
                ReorderEntity::Space => SpaceManager::new(&conn).reorder_spaces(user, &items).map_err(|e| e.to_string())?,
                ReorderEntity::Category => CategoryManager::new(&conn).reorder_categories(user, &items).map_err(|e| e.to_string())?,
                ReorderEntity::Bookmark => BookmarkManager::new(&conn).reorder_bookmarks(user, &items).map_err(|e| e.to_string())?,
            }
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => {
            let user = user_id(params)?;
            let conn = app.db.connection();
            let settings = SettingsManager::new(&conn)
                .get_or_create(user, app.config.allow_registration_default)
                .map_err(|e| e.to_string())?;
            Ok(json!({"settings": to_json(&settings)?}))
        }
        "settings.update" => {
            let user = user_id(params)?;
            let update: SettingsUpdate = parse(params)?;
            let conn = app.db.connection();
            let settings = SettingsManager::new(&conn)
                .update_settings(user, update, app.config.allow_registration_default)
                .map_err(|e| e.to_string())?;
            Ok(json!({"settings": to_json(&settings)?}))
        }
        "registration.get" => {
            let conn = app.db.connection();
            let allowed = SettingsManager::new(&conn)
                .registration_allowed(app.config.allow_registration_default)
                .map_err(|e| e.to_string())?;
            Ok(json!({"allowRegistration": allowed}))
        }
        "registration.set" => {
            let allowed = params
                .get("allowRegistration")
                .and_then(|v| v.as_bool())
                .ok_or("missing allowRegistration")?;
            let conn = app.db.connection();
            SettingsManager::new(&conn)
                .set_allow_registration(allowed)
                .map_err(|e| e.to_string())?;
            Ok(json!({"allowRegistration": allowed}))
        }

        // ─── Icons ───
        "icon.upload" => {
            let user = user_id(params)?;
            let file_name = params.get("fileName").and_then(|v| v.as_str()).ok_or("missing fileName")?;
            let data = params.get("data").and_then(|v| v.as_str()).ok_or("missing data")?;
            let bytes = base64_decode(data)?;
            let target = upload_target(app, user, params)?;
            let stored = app
                .icons
                .save_uploaded_icon(&target, file_name, &bytes)
                .map_err(|e| e.to_string())?;
            Ok(to_json(&stored)?)
        }
        "icon.delete" => {
            let file_name = params.get("fileName").and_then(|v| v.as_str()).ok_or("missing fileName")?;
            app.icons.delete_legacy_icon(file_name).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "favicon.resolve" => {
            let url = params.get("url").and_then(|v| v.as_str()).ok_or("missing url")?;
            let icon = app.favicons.resolve(url).await;
            Ok(to_json(&icon)?)
        }

        // ─── Backup ───
        "backup.create" => {
            let user = user_id(params)?;
            let bytes = app.backups.create_backup(user).await.map_err(|e| e.to_string())?;
            Ok(json!({
                "filename": BACKUP_FILENAME,
                "contentType": BACKUP_CONTENT_TYPE,
                "data": base64_encode(&bytes),
            }))
        }
        "backup.inspect" => {
            let data = params.get("data").and_then(|v| v.as_str()).ok_or("missing data")?;
            let archive = BackupService::parse_archive(&base64_decode(data)?).map_err(|e| e.to_string())?;
            Ok(json!({
                "spaces": archive.payload.spaces.len(),
                "categories": archive.payload.categories.len(),
                "bookmarks": archive.payload.bookmarks.len(),
                "hasSettings": archive.payload.settings.is_some(),
                "files": archive.files.len(),
            }))
        }
        "backup.restore" => {
            let user = user_id(params)?;
            let path = params.get("path").and_then(|v| v.as_str()).ok_or("missing path")?;
            let repair = match params.get("repair") {
                Some(v) if !v.is_null() => {
                    serde_json::from_value::<RepairStrategy>(v.clone()).map_err(|_| "invalid repair strategy")?
                }
                _ => RepairStrategy::default(),
            };
            let path = PathBuf::from(path);
            let result = app.backups.restore_backup(user, &path, RestoreOptions { repair }).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to delete uploaded backup");
            }
            let report = result.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "report": to_json(&report)?}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}

/// Maps `{type, spaceId, categoryId?, bookmarkTitle?}` to a location in the icon tree.
fn upload_target(app: &App, user: &str, params: &Value) -> Result<UploadTarget, String> {
    let kind = params.get("type").and_then(|v| v.as_str()).ok_or("missing type")?;
    let space_id = params.get("spaceId").and_then(|v| v.as_str()).ok_or("missing spaceId")?;

    let conn = app.db.connection();
    let space = SpaceManager::new(&conn).get_space(user, space_id).map_err(|e| e.to_string())?;
    if kind == "space" {
        return Ok(UploadTarget::Space { space_name: space.name });
    }

    let category_id = params
        .get("categoryId")
        .and_then(|v| v.as_str())
        .ok_or("categoryId is required for this type")?;
    let category = CategoryManager::new(&conn)
        .get_category(user, category_id)
        .map_err(|e| e.to_string())?;

    match kind {
        "category" => Ok(UploadTarget::Category {
            space_name: space.name,
            category_name: category.name,
        }),
        "bookmark" => Ok(UploadTarget::Bookmark {
            space_name: space.name,
            category_name: category.name,
            title: opt_str(params, "bookmarkTitle"),
        }),
        other => Err(format!("invalid upload type: {}", other)),
    }
}

/// Lists bookmarks, resolving favicons for automatic-icon bookmarks that have none.
async fn list_bookmarks(app: &App, user: &str, category_id: Option<&str>) -> Result<Vec<Bookmark>, String> {
    let mut bookmarks = {
        let conn = app.db.connection();
        let mgr = BookmarkManager::new(&conn);
        match category_id {
            Some(cid) => mgr.list_in_category(user, cid),
            None => mgr.list_bookmarks(user),
        }
        .map_err(|e| e.to_string())?
    };

    for bookmark in bookmarks.iter_mut() {
        if bookmark.icon_url.is_some() || bookmark.icon_is_uploaded || bookmark.service_url.is_empty() {
            continue;
        }
        let icon = app.favicons.resolve(&bookmark.service_url).await;
        if icon.icon_url.is_none() {
            continue;
        }
        if bookmark.icon_path.is_none() {
            let conn = app.db.connection();
            if let Err(e) = BookmarkManager::new(&conn).set_icon(
                user,
                &bookmark.id,
                icon.icon_path.as_deref(),
                icon.icon_url.as_deref(),
                false,
            ) {
                warn!(bookmark = %bookmark.id, error = %e, "failed to persist resolved favicon");
            }
            bookmark.icon_path = icon.icon_path;
        }
        bookmark.icon_url = icon.icon_url;
    }
    Ok(bookmarks)
}

/// Creates a bookmark. Without an explicit icon the favicon is resolved and
/// the icon is marked automatic; an explicit icon is marked uploaded.
async fn create_bookmark(app: &App, user: &str, mut new: NewBookmark) -> Result<Bookmark, String> {
    validate_service_url(&new.service_url).map_err(|e| e.to_string())?;

    if new.icon_path.is_none() && new.icon_url.is_none() {
        let icon = app.favicons.resolve(&new.service_url).await;
        if icon.is_found() {
            new.icon_path = icon.icon_path;
            new.icon_url = icon.icon_url;
        }
        new.icon_is_uploaded = false;
    } else {
        new.icon_is_uploaded = true;
    }

    let conn = app.db.connection();
    BookmarkManager::new(&conn)
        .create_bookmark(user, new)
        .map_err(|e| e.to_string())
}

/// Applies a bookmark update with favicon handling.
///
/// - Explicit `null` icon: resolve from the current service URL, else clear.
/// - Explicit icon: stored as uploaded unless `iconIsUploaded` says otherwise.
/// - New service URL without an icon: resolve from the new URL.
///
/// A result that still has no icon and is not uploaded gets one more resolve.
async fn update_bookmark(app: &App, user: &str, id: &str, params: &Value) -> Result<Bookmark, String> {
    let mut update = BookmarkUpdate {
        title: opt_str(params, "title"),
        description: opt_str(params, "description"),
        service_url: opt_str(params, "serviceUrl"),
        opening_method: params
            .get("openingMethod")
            .and_then(|v| v.as_str())
            .map(OpeningMethod::from_str_lossy),
        space_id: opt_str(params, "spaceId"),
        category_id: opt_str(params, "categoryId"),
        icon_change: IconChange::from_json(params),
        icon_is_uploaded: params.get("iconIsUploaded").and_then(|v| v.as_bool()),
    };

    match update.icon_change {
        IconChange::Remove => {
            let current = {
                let conn = app.db.connection();
                BookmarkManager::new(&conn).get_bookmark(user, id).map_err(|e| e.to_string())?
            };
            if !current.service_url.is_empty() {
                debug!(bookmark = id, "icon removed, resolving favicon");
                let icon = app.favicons.resolve(&current.service_url).await;
                if icon.is_found() {
                    update.icon_change = IconChange::Set { path: icon.icon_path, url: icon.icon_url };
                    update.icon_is_uploaded = Some(false);
                }
            }
        }
        IconChange::Set { .. } => {}
        IconChange::Keep => {
            if let Some(url) = update.service_url.as_deref() {
                validate_service_url(url).map_err(|e| e.to_string())?;
                let icon = app.favicons.resolve(url).await;
                if icon.is_found() {
                    update.icon_change = IconChange::Set { path: icon.icon_path, url: icon.icon_url };
                    update.icon_is_uploaded = Some(false);
                }
            }
        }
    }

    let mut bookmark = {
        let conn = app.db.connection();
        BookmarkManager::new(&conn)
            .update_bookmark(user, id, update)
            .map_err(|e| e.to_string())?
    };

    if bookmark.icon_url.is_none() && !bookmark.icon_is_uploaded && !bookmark.service_url.is_empty() {
        let icon = app.favicons.resolve(&bookmark.service_url).await;
        if icon.icon_url.is_some() {
            let conn = app.db.connection();
            BookmarkManager::new(&conn)
                .set_icon(user, id, icon.icon_path.as_deref(), icon.icon_url.as_deref(), false)
                .map_err(|e| e.to_string())?;
            bookmark.icon_path = icon.icon_path;
            bookmark.icon_url = icon.icon_url;
        }
    }
    Ok(bookmark)
}
