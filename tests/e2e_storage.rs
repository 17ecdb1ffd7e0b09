//! End-to-end tests for compressed local storage.
//!
//! Runs the storage service against both the in-memory and the SQLite
//! backed stores.

use std::sync::Arc;

use notecomp::monitor::NoMemoryProbe;
use notecomp::{
    Algorithm, CompressionService, DurableStore, LocalStorageCompressionOptions,
    LocalStorageCompressionService, LocalStorageItem, MemoryStore, SqliteStore,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    id: u32,
    title: String,
    body: String,
    tags: Vec<String>,
}

fn compression() -> Arc<CompressionService> {
    Arc::new(CompressionService::default().with_memory_probe(Arc::new(NoMemoryProbe)))
}

fn large_note() -> Note {
    Note {
        id: 7,
        title: "Groceries".to_string(),
        body: "milk, eggs, bread, butter; ".repeat(190),
        tags: vec!["home".to_string(), "weekly".to_string()],
    }
}

fn options(threshold: usize) -> LocalStorageCompressionOptions {
    LocalStorageCompressionOptions {
        compression_threshold: threshold,
        ..Default::default()
    }
}

/// A large repetitive object is stored compressed and read back equal
#[tokio::test]
async fn test_store_and_retrieve_large_object() {
    let storage = LocalStorageCompressionService::new(compression(), Arc::new(MemoryStore::new()));
    let note = large_note();
    let serialized_len = serde_json::to_string(&note).unwrap().len();
    assert!(serialized_len > 5000);

    let item = storage.store("note:7", &note, &options(100)).await.unwrap();
    assert!(item.compressed);
    assert_eq!(item.algorithm, Algorithm::Gzip);
    assert_eq!(item.original_size, serialized_len);
    assert!(item.compressed_size < item.original_size);

    let back: Note = storage.retrieve("note:7").await.unwrap().unwrap();
    assert_eq!(back, note);
}

/// Small values are kept verbatim
#[tokio::test]
async fn test_small_value_is_stored_raw() {
    let storage = LocalStorageCompressionService::new(compression(), Arc::new(MemoryStore::new()));

    let item = storage
        .store("pref:theme", "dark", &options(1024))
        .await
        .unwrap();
    assert!(!item.compressed);
    assert_eq!(item.value, "\"dark\"");
    assert_eq!(item.algorithm, Algorithm::None);

    let back: Option<String> = storage.retrieve("pref:theme").await.unwrap();
    assert_eq!(back.as_deref(), Some("dark"));
}

/// Missing keys are absent, not errors
#[tokio::test]
async fn test_missing_key_is_none() {
    let storage = LocalStorageCompressionService::new(compression(), Arc::new(MemoryStore::new()));
    let back: Option<Note> = storage.retrieve("nope").await.unwrap();
    assert!(back.is_none());
}

/// Remove and clear reach the durable store and the mirror
#[tokio::test]
async fn test_remove_and_clear() {
    let store = Arc::new(MemoryStore::new());
    let storage = LocalStorageCompressionService::new(compression(), store.clone());

    storage.store("a", &large_note(), &options(100)).await.unwrap();
    storage.store("b", "small", &options(100)).await.unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

    assert!(storage.remove("a").unwrap());
    assert!(!storage.remove("a").unwrap());
    assert!(!storage.contains("a").unwrap());
    assert!(store.get("a").unwrap().is_none());

    storage.clear().unwrap();
    assert!(storage.keys().unwrap().is_empty());
    assert_eq!(storage.cache_len(), 0);
}

/// Aggregate stats reflect what was written
#[tokio::test]
async fn test_storage_stats() {
    let storage = LocalStorageCompressionService::new(compression(), Arc::new(MemoryStore::new()));

    let big = storage.store("big", &large_note(), &options(100)).await.unwrap();
    let small = storage.store("small", "x", &options(100)).await.unwrap();

    let stats = storage.get_stats().unwrap();
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.compressed_items, 1);
    assert_eq!(
        stats.total_original_size,
        big.original_size + small.original_size
    );
    assert_eq!(
        stats.total_compressed_size,
        big.compressed_size + small.compressed_size
    );
    assert_eq!(stats.bytes_saved, big.original_size - big.compressed_size);
    assert!(stats.average_compression_ratio < 1.0);
}

/// Values survive reopening the database file
#[tokio::test]
async fn test_sqlite_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");
    let note = large_note();

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let storage = LocalStorageCompressionService::new(compression(), store);
        let item = storage.store("note:7", &note, &options(100)).await.unwrap();
        assert!(item.compressed);
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let storage = LocalStorageCompressionService::new(compression(), store);
    assert_eq!(storage.cache_len(), 0);

    let back: Note = storage.retrieve("note:7").await.unwrap().unwrap();
    assert_eq!(back, note);
    assert_eq!(storage.cache_len(), 1);
}

/// Stale uncompressed items are recompressed in place
#[tokio::test]
async fn test_optimize_storage_recompresses_old_items() {
    let store = Arc::new(MemoryStore::new());
    let storage = LocalStorageCompressionService::new(compression(), store.clone());
    let note = large_note();

    let written = chrono::Utc::now() - chrono::Duration::days(30);
    let old = LocalStorageItem::uncompressed("note:7", serde_json::to_string(&note).unwrap())
        .at(written);
    store.put(&old).unwrap();
    let fresh = storage
        .store("note:8", &note, &LocalStorageCompressionOptions {
            enable_selective_compression: false,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!fresh.compressed);

    let report = storage.optimize_storage().await.unwrap();
    assert_eq!(report.items_scanned, 1);
    assert_eq!(report.items_optimized, 1);
    assert!(report.bytes_saved > 0);

    let stored = store.get("note:7").unwrap().unwrap();
    assert!(stored.compressed);
    assert_eq!(stored.timestamp, written);
    assert!(!store.get("note:8").unwrap().unwrap().compressed);

    let back: Note = storage.retrieve("note:7").await.unwrap().unwrap();
    assert_eq!(back, note);
}
