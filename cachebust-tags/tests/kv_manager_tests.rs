//! KvTagManager tests against a temporary cache directory

use std::fs;
use std::sync::Arc;

use cachebust_tags::{
    CacheStore, DigestStore, InMemoryKeyValue, KvTagManager, PurgeError, TagManager,
    TagManagerConfig, TagStorage,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use http::HeaderMap;
use tempfile::TempDir;

/// Writes a fake cached body for `digest` and returns its path
fn write_entry(store: &DigestStore, digest: &str) -> std::path::PathBuf {
    let path = store.path_for(digest).unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"cached body").unwrap();
    path
}

fn tagged_headers(digest: &str, tags: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-content-digest", HeaderValue::from_str(digest).unwrap());
    headers.insert("x-cache-tags", HeaderValue::from_str(tags).unwrap());
    headers
}

fn setup() -> (TempDir, DigestStore, KvTagManager) {
    let dir = TempDir::new().unwrap();
    let store = DigestStore::new(dir.path());
    let storage = TagStorage::new(Arc::new(InMemoryKeyValue::new()));
    let manager = KvTagManager::new(storage, Arc::new(store.clone()));
    (dir, store, manager)
}

#[test]
fn test_tag_response_then_invalidate() {
    let (_dir, store, manager) = setup();

    let first = write_entry(&store, "en1111111111");
    let second = write_entry(&store, "en2222222222");
    let untagged = write_entry(&store, "en3333333333");

    manager.tag_response(&tagged_headers("en1111111111", r#"["post-1", "posts"]"#)).unwrap();
    manager.tag_response(&tagged_headers("en2222222222", r#"["posts"]"#)).unwrap();

    assert_eq!(
        manager.storage().get_cache_ids(&["posts"]).unwrap(),
        vec!["en1111111111", "en2222222222"]
    );

    // The first entry is listed under both tags but only removed once.
    let removed = manager.invalidate_tags(&["post-1", "posts"]).unwrap();
    assert_eq!(removed, 2);

    assert!(!first.exists());
    assert!(!second.exists());
    assert!(untagged.exists());
    assert!(manager.storage().get_cache_ids(&["post-1", "posts"]).unwrap().is_empty());
}

#[test]
fn test_unknown_tag_removes_nothing() {
    let (_dir, _store, manager) = setup();
    assert_eq!(manager.invalidate_tags(&["never-used"]).unwrap(), 0);
}

#[test]
fn test_already_deleted_file_is_not_counted() {
    let (_dir, store, manager) = setup();

    let path = write_entry(&store, "en4444444444");
    manager.tag_response(&tagged_headers("en4444444444", r#"["t"]"#)).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(manager.invalidate_tags(&["t"]).unwrap(), 0);
    assert!(manager.storage().get_cache_ids(&["t"]).unwrap().is_empty());
}

#[test]
fn test_missing_headers_are_integrity_errors() {
    let (_dir, _store, manager) = setup();

    let mut headers = HeaderMap::new();
    headers.insert("x-cache-tags", HeaderValue::from_static(r#"["t"]"#));
    let err = manager.tag_response(&headers).unwrap_err();
    assert!(matches!(err, PurgeError::StorageIntegrity { .. }));

    let mut headers = HeaderMap::new();
    headers.insert("x-content-digest", HeaderValue::from_static("en5555555555"));
    assert!(matches!(
        manager.tag_response(&headers),
        Err(PurgeError::StorageIntegrity { .. })
    ));
}

#[test]
fn test_malformed_tags_header_is_an_error() {
    let (_dir, _store, manager) = setup();

    let err = manager
        .tag_response(&tagged_headers("en6666666666", "post-1, posts"))
        .unwrap_err();
    assert!(matches!(err, PurgeError::Json(_)));
}

#[test]
fn test_zero_max_age_expires_index_entry() {
    let (_dir, _store, manager) = setup();

    let mut headers = tagged_headers("en7777777777", r#"["t"]"#);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("s-maxage=0"));
    manager.tag_response(&headers).unwrap();

    assert!(manager.storage().get_cache_ids(&["t"]).unwrap().is_empty());
}

#[test]
fn test_custom_header_names() {
    let dir = TempDir::new().unwrap();
    let store = DigestStore::new(dir.path());
    let config = TagManagerConfig {
        digest_header: "X-Body-Digest".to_string(),
        tags_header: "X-Tags".to_string(),
    };
    let manager = KvTagManager::with_config(
        TagStorage::new(Arc::new(InMemoryKeyValue::new())),
        Arc::new(store),
        config,
    );

    let mut headers = HeaderMap::new();
    headers.insert("x-body-digest", HeaderValue::from_static("en8888888888"));
    headers.insert("x-tags", HeaderValue::from_static(r#"["t"]"#));
    manager.tag_response(&headers).unwrap();

    assert_eq!(manager.storage().get_cache_ids(&["t"]).unwrap(), vec!["en8888888888"]);
}

#[test]
fn test_digest_outside_cache_root_is_rejected() {
    let (dir, _store, manager) = setup();

    for digest in ["../escape", "ab/tmp/victim", "/tmp/x", "en\\1111111"] {
        let err = manager
            .tag_response(&tagged_headers(digest, r#"["t"]"#))
            .unwrap_err();
        assert!(matches!(err, PurgeError::StorageIntegrity { .. }), "{:?}", digest);
    }

    assert!(manager.storage().get_cache_ids(&["t"]).unwrap().is_empty());
    assert!(dir.path().is_dir());
}

#[test]
fn test_bad_digest_in_index_is_not_followed() {
    let (_dir, _store, manager) = setup();
    manager.storage().tag_cache_id(&["t"], "ab/tmp/victim", None).unwrap();

    let err = manager.invalidate_tags(&["t"]).unwrap_err();
    assert!(matches!(err, PurgeError::StorageIntegrity { .. }));
}
