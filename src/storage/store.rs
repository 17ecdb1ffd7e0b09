//! Durable key/value backends.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::LocalStorageItem;
use crate::error::{CompressError, Result};

/// Durable store behind the Local Storage service.
///
/// Writes are upserts keyed by `LocalStorageItem::key`.
pub trait DurableStore: Send + Sync {
    /// Insert or overwrite an item
    fn put(&self, item: &LocalStorageItem) -> Result<()>;

    /// Fetch an item
    fn get(&self, key: &str) -> Result<Option<LocalStorageItem>>;

    /// Delete an item, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// Delete everything
    fn clear(&self) -> Result<()>;

    /// All keys, sorted
    fn keys(&self) -> Result<Vec<String>>;

    /// All items
    fn all(&self) -> Result<Vec<LocalStorageItem>>;

    /// Uncompressed items written before `cutoff`
    fn uncompressed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<LocalStorageItem>>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS compressed_items (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        compressed INTEGER NOT NULL,
        original_size INTEGER NOT NULL,
        compressed_size INTEGER NOT NULL,
        compression_ratio REAL NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        algorithm TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_items_timestamp ON compressed_items(timestamp_ms);
    CREATE INDEX IF NOT EXISTS idx_items_compressed ON compressed_items(compressed);
";

const COLUMNS: &str = "key, value, compressed, original_size, compressed_size, \
                       compression_ratio, timestamp_ms, algorithm";

/// Raw row, converted to an item outside the rusqlite closure
struct ItemRow {
    key: String,
    value: String,
    compressed: bool,
    original_size: i64,
    compressed_size: i64,
    compression_ratio: f64,
    timestamp_ms: i64,
    algorithm: String,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            value: row.get(1)?,
            compressed: row.get(2)?,
            original_size: row.get(3)?,
            compressed_size: row.get(4)?,
            compression_ratio: row.get(5)?,
            timestamp_ms: row.get(6)?,
            algorithm: row.get(7)?,
        })
    }

    fn into_item(self) -> Result<LocalStorageItem> {
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| {
                CompressError::Storage(format!("Bad timestamp for {}: {}", self.key, self.timestamp_ms))
            })?;
        Ok(LocalStorageItem {
            algorithm: self.algorithm.parse()?,
            key: self.key,
            value: self.value,
            compressed: self.compressed,
            original_size: self.original_size as usize,
            compressed_size: self.compressed_size as usize,
            compression_ratio: self.compression_ratio,
            timestamp,
        })
    }
}

/// SQLite-backed store: one table keyed by item key, indexed by timestamp
/// and compressed flag.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| CompressError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;

        info!("Local storage opened: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CompressError::Storage(format!("Lock poisoned: {e}")))
    }

    fn query_items(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<LocalStorageItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ItemRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

impl DurableStore for SqliteStore {
    fn put(&self, item: &LocalStorageItem) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO compressed_items ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    compressed = excluded.compressed,
                    original_size = excluded.original_size,
                    compressed_size = excluded.compressed_size,
                    compression_ratio = excluded.compression_ratio,
                    timestamp_ms = excluded.timestamp_ms,
                    algorithm = excluded.algorithm"
            ),
            params![
                item.key,
                item.value,
                item.compressed,
                item.original_size as i64,
                item.compressed_size as i64,
                item.compression_ratio,
                item.timestamp.timestamp_millis(),
                item.algorithm.name(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<LocalStorageItem>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM compressed_items WHERE key = ?1"),
                params![key],
                ItemRow::from_row,
            )
            .optional()?
        };
        row.map(ItemRow::into_item).transpose()
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM compressed_items WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM compressed_items", [])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM compressed_items ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn all(&self) -> Result<Vec<LocalStorageItem>> {
        self.query_items(
            &format!("SELECT {COLUMNS} FROM compressed_items ORDER BY key"),
            [],
        )
    }

    fn uncompressed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<LocalStorageItem>> {
        self.query_items(
            &format!(
                "SELECT {COLUMNS} FROM compressed_items
                 WHERE compressed = 0 AND timestamp_ms < ?1
                 ORDER BY timestamp_ms"
            ),
            params![cutoff.timestamp_millis()],
        )
    }
}

/// Process-local store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, LocalStorageItem>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<MutexGuard<'_, HashMap<String, LocalStorageItem>>> {
        self.items
            .lock()
            .map_err(|e| CompressError::Storage(format!("Lock poisoned: {e}")))
    }
}

impl DurableStore for MemoryStore {
    fn put(&self, item: &LocalStorageItem) -> Result<()> {
        self.items()?.insert(item.key.clone(), item.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<LocalStorageItem>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.items()?.remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.items()?.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.items()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn all(&self) -> Result<Vec<LocalStorageItem>> {
        let mut items: Vec<LocalStorageItem> = self.items()?.values().cloned().collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    fn uncompressed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<LocalStorageItem>> {
        let mut items: Vec<LocalStorageItem> = self
            .items()?
            .values()
            .filter(|item| !item.compressed && item.timestamp < cutoff)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.timestamp);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Algorithm;
    use chrono::Duration;

    fn stores() -> Vec<Box<dyn DurableStore>> {
        vec![
            Box::new(SqliteStore::open_in_memory().unwrap()),
            Box::new(MemoryStore::new()),
        ]
    }

    #[test]
    fn test_put_get_upsert_delete() {
        for store in stores() {
            let item = LocalStorageItem::uncompressed("note:1", "\"first\"".into());
            store.put(&item).unwrap();

            let mut fetched = store.get("note:1").unwrap().unwrap();
            assert_eq!(fetched.value, "\"first\"");
            assert_eq!(fetched.algorithm, Algorithm::None);
            assert_eq!(
                fetched.timestamp.timestamp_millis(),
                item.timestamp.timestamp_millis()
            );

            fetched.value = "\"second\"".into();
            store.put(&fetched).unwrap();
            assert_eq!(store.get("note:1").unwrap().unwrap().value, "\"second\"");
            assert_eq!(store.keys().unwrap(), vec!["note:1".to_string()]);

            assert!(store.delete("note:1").unwrap());
            assert!(!store.delete("note:1").unwrap());
            assert!(store.get("note:1").unwrap().is_none());
        }
    }

    #[test]
    fn test_uncompressed_before() {
        for store in stores() {
            let old = Utc::now() - Duration::days(10);
            store
                .put(&LocalStorageItem::uncompressed("old", "1".into()).at(old))
                .unwrap();
            store
                .put(&LocalStorageItem::uncompressed("new", "2".into()))
                .unwrap();
            let mut packed = LocalStorageItem::uncompressed("packed", "3".into()).at(old);
            packed.compressed = true;
            packed.algorithm = Algorithm::Gzip;
            store.put(&packed).unwrap();

            let stale = store
                .uncompressed_before(Utc::now() - Duration::days(7))
                .unwrap();
            assert_eq!(stale.len(), 1);
            assert_eq!(stale[0].key, "old");

            assert_eq!(store.all().unwrap().len(), 3);
            store.clear().unwrap();
            assert!(store.keys().unwrap().is_empty());
        }
    }

    #[test]
    fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put(&LocalStorageItem::uncompressed("k", "\"v\"".into()))
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().unwrap().value, "\"v\"");
    }
}
