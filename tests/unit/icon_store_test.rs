//! Unit tests for the on-disk icon store.

use std::fs;

use bookdash::services::icon_store::IconStore;
use bookdash::types::errors::IconStoreError;
use bookdash::types::icon::UploadTarget;
use rstest::rstest;
use tempfile::TempDir;

fn store(tmp: &TempDir) -> IconStore {
    IconStore::new(tmp.path().join("uploads"), "/uploads/", 1024)
}

#[test]
fn test_save_fetched_icon_lands_in_flat_dir() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);

    let stored = icons.save_fetched_icon(b"\x00\x00\x01\x00", "ico").unwrap();
    assert!(stored.icon_url.starts_with("/uploads/icons/"));
    assert!(stored.icon_url.ends_with(".ico"));
    assert!(stored.icon_path.starts_with(icons.legacy_dir().to_string_lossy().as_ref()));
    assert_eq!(fs::read(&stored.icon_path).unwrap(), b"\x00\x00\x01\x00");
}

#[test]
fn test_upload_targets_follow_hierarchy() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);

    let space = icons
        .save_uploaded_icon(&UploadTarget::Space { space_name: "Home Lab".to_string() }, "logo.PNG", b"png")
        .unwrap();
    assert_eq!(space.icon_url, "/uploads/spaces/Home_Lab/space.png");

    let category = icons
        .save_uploaded_icon(
            &UploadTarget::Category { space_name: "Home Lab".to_string(), category_name: "Media/TV".to_string() },
            "c.svg",
            b"<svg/>",
        )
        .unwrap();
    assert_eq!(category.icon_url, "/uploads/spaces/Home_Lab/Media_TV/category.svg");

    let bookmark = icons
        .save_uploaded_icon(
            &UploadTarget::Bookmark {
                space_name: "Home Lab".to_string(),
                category_name: "Media/TV".to_string(),
                title: Some("Jelly fin".to_string()),
            },
            "j.webp",
            b"webp",
        )
        .unwrap();
    assert_eq!(bookmark.icon_url, "/uploads/spaces/Home_Lab/Media_TV/Jelly_fin.webp");
    assert!(icons.category_dir("Home Lab", "Media/TV").join("Jelly_fin.webp").is_file());
}

#[test]
fn test_untitled_bookmark_upload_gets_random_name() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    let target = UploadTarget::Bookmark {
        space_name: "S".to_string(),
        category_name: "C".to_string(),
        title: None,
    };

    let a = icons.save_uploaded_icon(&target, "a.png", b"1").unwrap();
    let b = icons.save_uploaded_icon(&target, "b.png", b"2").unwrap();
    assert_ne!(a.icon_path, b.icon_path);
    assert!(a.icon_url.starts_with("/uploads/spaces/S/C/"));
}

#[rstest]
#[case("virus.exe")]
#[case("noext")]
#[case("image.gif")]
fn test_upload_rejects_extension(#[case] name: &str) {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    let result = icons.save_uploaded_icon(&UploadTarget::Space { space_name: "S".to_string() }, name, b"x");
    assert!(matches!(result, Err(IconStoreError::InvalidFileType(_))));
}

#[test]
fn test_upload_rejects_oversized_file() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    let big = vec![0u8; 1025];
    let result = icons.save_uploaded_icon(&UploadTarget::Space { space_name: "S".to_string() }, "a.png", &big);
    assert!(matches!(result, Err(IconStoreError::TooLarge(1025))));
    assert!(!icons.spaces_dir().exists());
}

#[rstest]
#[case("../secret.png")]
#[case("a/b.png")]
#[case("a\\b.png")]
#[case("")]
fn test_delete_legacy_icon_rejects_unsafe_names(#[case] name: &str) {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    assert!(matches!(icons.delete_legacy_icon(name), Err(IconStoreError::InvalidFileName(_))));
}

#[test]
fn test_delete_legacy_icon() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    let stored = icons.save_fetched_icon(b"x", "png").unwrap();
    let name = stored.icon_url.rsplit('/').next().unwrap().to_string();

    icons.delete_legacy_icon(&name).unwrap();
    assert!(!std::path::Path::new(&stored.icon_path).exists());
    assert!(matches!(icons.delete_legacy_icon(&name), Err(IconStoreError::NotFound(_))));
}

#[test]
fn test_file_size_reports_missing_and_empty() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    let stored = icons.save_fetched_icon(b"abc", "png").unwrap();
    let empty = icons.save_fetched_icon(b"", "png").unwrap();

    assert_eq!(icons.file_size(&stored.icon_path), Some(3));
    assert_eq!(icons.file_size(&empty.icon_path), Some(0));
    assert_eq!(icons.file_size("/definitely/not/here.png"), None);
    assert_eq!(icons.file_size(""), None);
    assert_eq!(icons.file_size(&icons.legacy_dir().to_string_lossy()), None, "directories are not files");
}

#[test]
fn test_collect_space_files_uses_archive_names() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    assert!(icons.collect_space_files().unwrap().is_empty());

    icons
        .save_uploaded_icon(&UploadTarget::Space { space_name: "Home".to_string() }, "s.png", b"s")
        .unwrap();
    icons
        .save_uploaded_icon(
            &UploadTarget::Category { space_name: "Home".to_string(), category_name: "Media".to_string() },
            "c.png",
            b"c",
        )
        .unwrap();
    icons.save_fetched_icon(b"f", "ico").unwrap();

    let names: Vec<String> = icons.collect_space_files().unwrap().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["spaces/Home/Media/category.png", "spaces/Home/space.png"]);
}

#[test]
fn test_write_archive_entry_routes_by_prefix() {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);

    assert!(icons.write_archive_entry("icons/old.ico", b"legacy").unwrap());
    assert_eq!(fs::read(icons.legacy_dir().join("old.ico")).unwrap(), b"legacy");

    assert!(icons.write_archive_entry("spaces/Home/Media/x.png", b"new").unwrap());
    assert_eq!(fs::read(icons.spaces_dir().join("Home").join("Media").join("x.png")).unwrap(), b"new");
}

#[rstest]
#[case("spaces/../../escape.png")]
#[case("icons/../x.png")]
#[case("data.json")]
#[case("other/x.png")]
#[case("spaces/")]
fn test_write_archive_entry_skips_unsafe_or_foreign(#[case] name: &str) {
    let tmp = TempDir::new().unwrap();
    let icons = store(&tmp);
    assert!(!icons.write_archive_entry(name, b"x").unwrap());
    assert!(!tmp.path().join("escape.png").exists());
    assert!(!icons.root().join("x.png").exists());
}
