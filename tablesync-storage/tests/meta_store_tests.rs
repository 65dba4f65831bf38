use tablesync_storage::{MemoryMetaStore, MetaStore, SqliteMetaStore, StorageError};
use tablesync_types::{MetaKey, MetaMap};
use tempfile::TempDir;

fn digest_key() -> MetaKey {
    MetaKey::digest("parts:Parts")
}

// ── SQLite ───────────────────────────────────────────────────────

#[tokio::test]
async fn new_store_is_empty() {
    let store = SqliteMetaStore::open_in_memory().unwrap();
    let meta = store.load().await.unwrap();
    assert!(meta.is_empty());
    assert!(!meta.is_dirty());
}

#[tokio::test]
async fn commit_then_load_roundtrips_entries() {
    let store = SqliteMetaStore::open_in_memory().unwrap();
    let mut meta = store.load().await.unwrap();
    meta.set(&digest_key(), "abc123");
    meta.set(&MetaKey::trigger("mfg_triggered", "L-1").unwrap(), "2024-05-01 12:00:00");
    store.commit(&meta).await.unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get(&digest_key()), Some("abc123"));
    assert!(!loaded.is_dirty());
}

#[tokio::test]
async fn commit_overwrites_and_keeps_absent_entries() {
    let store = SqliteMetaStore::open_in_memory().unwrap();
    store
        .commit(&MetaMap::from_entries(vec![("hash:a", "1"), ("hash:b", "2")]))
        .await
        .unwrap();
    store
        .commit(&MetaMap::from_entries(vec![("hash:a", "3")]))
        .await
        .unwrap();

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.get(&MetaKey::digest("a")), Some("3"));
    assert_eq!(loaded.get(&MetaKey::digest("b")), Some("2"));
}

#[tokio::test]
async fn single_entry_get_and_set() {
    let store = SqliteMetaStore::open_in_memory().unwrap();
    assert_eq!(store.get(&digest_key()).await.unwrap(), None);
    store.set(&digest_key(), "d1").await.unwrap();
    assert_eq!(store.get(&digest_key()).await.unwrap().as_deref(), Some("d1"));
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.sqlite");

    {
        let store = SqliteMetaStore::new(&path).unwrap();
        store.set(&digest_key(), "persisted").await.unwrap();
    }

    let reopened = SqliteMetaStore::new(&path).unwrap();
    assert_eq!(
        reopened.get(&digest_key()).await.unwrap().as_deref(),
        Some("persisted")
    );
}

#[tokio::test]
async fn foreign_entries_are_preserved() {
    let store = SqliteMetaStore::open_in_memory().unwrap();
    store
        .commit(&MetaMap::from_entries(vec![("some-other-setting", "on")]))
        .await
        .unwrap();
    let loaded = store.load().await.unwrap();
    let entries: Vec<(&str, &str)> = loaded.entries().collect();
    assert_eq!(entries, vec![("some-other-setting", "on")]);
}

// ── Memory ───────────────────────────────────────────────────────

#[tokio::test]
async fn memory_store_counts_commits() {
    let store = MemoryMetaStore::with_entries(vec![("hash:x", "old")]);
    assert_eq!(store.commits().unwrap(), 0);

    let mut meta = store.load().await.unwrap();
    meta.set(&MetaKey::digest("x"), "new");
    store.commit(&meta).await.unwrap();

    assert_eq!(store.commits().unwrap(), 1);
    assert_eq!(store.snapshot().unwrap().get("hash:x").map(String::as_str), Some("new"));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn sqlite_failures_surface_as_database_errors() {
    let dir = TempDir::new().unwrap();
    let Err(err) = SqliteMetaStore::new(dir.path().join("missing").join("meta.db")) else {
        panic!("opening a file in a missing directory succeeded");
    };
    assert!(matches!(err, StorageError::Database(_)));
    assert!(err.to_string().starts_with("database error:"));
}

#[test]
fn backend_errors_keep_their_message() {
    let err = StorageError::Backend("tab _meta not readable".into());
    assert_eq!(err.to_string(), "backend error: tab _meta not readable");
    assert_eq!(StorageError::Poisoned.to_string(), "store lock poisoned");
}
