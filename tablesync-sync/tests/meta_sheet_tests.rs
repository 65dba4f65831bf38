mod common;

use common::{strings, FakeSheet};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tablesync_storage::MetaStore;
use tablesync_sync::SheetMetaStore;
use tablesync_types::{MetaKey, MetaMap};

#[tokio::test]
async fn load_creates_tab_with_header() {
    let sheet = Arc::new(FakeSheet::new());
    let store = SheetMetaStore::new(sheet.clone(), "_meta");

    let meta = store.load().await.unwrap();

    assert!(meta.is_empty());
    assert!(!meta.is_dirty());
    assert_eq!(sheet.tab("_meta").unwrap().header, strings(&["key", "value"]));
}

#[tokio::test]
async fn load_reads_pairs_and_skips_blank_keys() {
    let sheet = Arc::new(FakeSheet::new().with_tab(
        "_meta",
        &["key", "value"],
        &[&["hash:items", "abc"], &["", "orphan"], &["statusDone:1", "2026-01-01 00:00:00"], &["lonely"]],
    ));
    let store = SheetMetaStore::new(sheet, "_meta");

    let meta = store.load().await.unwrap();

    assert_eq!(meta.len(), 3);
    assert_eq!(meta.get(&MetaKey::digest("items")), Some("abc"));
    assert!(meta.is_set(&MetaKey::trigger("statusDone", "1").unwrap()));
    assert_eq!(meta.entries().find(|(k, _)| *k == "lonely").map(|(_, v)| v), Some(""));
}

#[tokio::test]
async fn commit_merges_with_stored_entries() {
    let sheet = Arc::new(FakeSheet::new().with_tab(
        "_meta",
        &["key", "value"],
        &[&["hash:other", "keep"], &["hash:items", "old"]],
    ));
    let store = SheetMetaStore::new(sheet.clone(), "_meta");

    let mut meta = MetaMap::new();
    meta.set(&MetaKey::digest("items"), "new");
    store.commit(&meta).await.unwrap();

    assert_eq!(
        sheet.rows("_meta"),
        vec![strings(&["hash:items", "new"]), strings(&["hash:other", "keep"])]
    );
}

#[tokio::test]
async fn get_and_set_single_entries() {
    let sheet = Arc::new(FakeSheet::new());
    let store = SheetMetaStore::new(sheet, "_meta");
    let key = MetaKey::digest("items");

    assert_eq!(store.get(&key).await.unwrap(), None);
    store.set(&key, "d1").await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("d1"));
}
