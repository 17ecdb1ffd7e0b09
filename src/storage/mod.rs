//! Local Storage Compression Service.
//!
//! Persists serialized values to a [`DurableStore`], compressing the ones
//! that reach a size threshold, with a bounded in-memory mirror in front:
//!
//! ```text
//! store(key, value)                       retrieve(key)
//!   │ serde_json                            │
//!   ├─ len < threshold ─> raw               ├─ mirror hit ──┐
//!   ├─ compress ok ─────> base64            ├─ store.get ───┤ (fills mirror)
//!   ├─ compress failed ─> raw               │               v
//!   v                                       │      compressed ? decode : raw
//! store.put (upsert) + mirror insert        └─> serde_json
//! ```
//!
//! Store faults propagate as `Err`: silently losing a write is worse than
//! failing loudly. Codec faults during `store` fall back to the raw form.

mod item;
mod store;

pub use item::LocalStorageItem;
pub use store::{DurableStore, MemoryStore, SqliteStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec::Algorithm;
use crate::config::{StorageConfig, MAX_LEVEL};
use crate::error::{CompressError, Result};
use crate::service::{CompressionOptions, CompressionService};

/// Threshold used when recompressing stale items
const OPTIMIZE_THRESHOLD: usize = 512;

/// Per-call options for [`LocalStorageCompressionService::store`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageCompressionOptions {
    /// Minimum serialized size in bytes before compressing
    pub compression_threshold: usize,
    /// Compress values that reach the threshold
    pub enable_selective_compression: bool,
    /// Codec
    pub algorithm: Algorithm,
    /// Level override
    pub level: Option<u32>,
    /// Codec deadline
    pub timeout: Option<Duration>,
}

impl Default for LocalStorageCompressionOptions {
    fn default() -> Self {
        Self {
            compression_threshold: 1024,
            enable_selective_compression: true,
            algorithm: Algorithm::Gzip,
            level: None,
            timeout: None,
        }
    }
}

/// Aggregate over every stored item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Stored items
    pub total_items: usize,
    /// Items held compressed
    pub compressed_items: usize,
    /// Sum of serialized sizes
    pub total_original_size: usize,
    /// Sum of stored sizes (compressed bytes for compressed items)
    pub total_compressed_size: usize,
    /// total_compressed_size / total_original_size, 1.0 when empty
    pub average_compression_ratio: f64,
    /// total_original_size - total_compressed_size
    pub bytes_saved: usize,
    /// Entries in the in-memory mirror
    pub cache_size: usize,
}

/// Outcome of [`LocalStorageCompressionService::optimize_storage`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Stale uncompressed items found
    pub items_scanned: usize,
    /// Items rewritten compressed
    pub items_optimized: usize,
    /// Bytes saved by the rewrite
    pub bytes_saved: usize,
}

/// Compressed key/value storage
pub struct LocalStorageCompressionService {
    service: Arc<CompressionService>,
    store: Arc<dyn DurableStore>,
    cache: Mutex<HashMap<String, LocalStorageItem>>,
    max_cache_size: usize,
    optimize_after: chrono::Duration,
}

impl LocalStorageCompressionService {
    /// Create a service over an existing store
    pub fn new(service: Arc<CompressionService>, store: Arc<dyn DurableStore>) -> Self {
        let defaults = StorageConfig::default();
        Self {
            service,
            store,
            cache: Mutex::new(HashMap::new()),
            max_cache_size: defaults.max_cache_size,
            optimize_after: chrono::Duration::days(defaults.optimize_after_days),
        }
    }

    /// Open the configured SQLite store (in-memory when no path is set)
    pub fn from_config(service: Arc<CompressionService>, config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn DurableStore> = match &config.path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(SqliteStore::open_in_memory()?),
        };
        Ok(Self::new(service, store)
            .with_max_cache_size(config.max_cache_size)
            .with_optimize_after(chrono::Duration::days(config.optimize_after_days)))
    }

    /// Set the mirror capacity
    pub fn with_max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = max_cache_size.max(1);
        self
    }

    /// Set the age after which `optimize_storage` recompresses raw items
    pub fn with_optimize_after(mut self, age: chrono::Duration) -> Self {
        self.optimize_after = age;
        self
    }

    /// Serialize, maybe compress, and persist a value
    pub async fn store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: &LocalStorageCompressionOptions,
    ) -> Result<LocalStorageItem> {
        let serialized =
            serde_json::to_string(value).map_err(|e| CompressError::Serialization(e.to_string()))?;

        let item = if options.enable_selective_compression
            && serialized.len() >= options.compression_threshold
        {
            let mut compression = CompressionOptions::new()
                .with_algorithm(options.algorithm)
                .with_threshold(options.compression_threshold);
            compression.level = options.level;
            compression.timeout = options.timeout;
            self.pack(key, serialized, &compression).await
        } else {
            LocalStorageItem::uncompressed(key, serialized)
        };

        let stored = item.clone();
        self.durable(move |store| store.put(&stored)).await?;
        self.cache_insert(item.clone());
        debug!(
            "Stored {} ({} -> {} bytes, {})",
            key, item.original_size, item.compressed_size, item.algorithm
        );
        Ok(item)
    }

    /// Compress a serialized value into an item, keeping it raw when the
    /// codec fails or does not shrink it
    async fn pack(
        &self,
        key: &str,
        serialized: String,
        options: &CompressionOptions,
    ) -> LocalStorageItem {
        let result = self.service.compress(&serialized, options).await;
        match &result.compressed_data {
            Some(bytes) if result.is_beneficial() => LocalStorageItem {
                key: key.to_string(),
                value: base64::engine::general_purpose::STANDARD.encode(bytes),
                compressed: true,
                original_size: result.original_size,
                compressed_size: result.compressed_size,
                compression_ratio: result.ratio,
                timestamp: chrono::Utc::now(),
                algorithm: result.algorithm,
            },
            _ => {
                if let Some(error) = &result.error {
                    warn!("Storing {} uncompressed: {}", key, error);
                }
                LocalStorageItem::uncompressed(key, serialized)
            },
        }
    }

    /// Read and deserialize a value; `Ok(None)` when the key is absent
    pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.retrieve_raw(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CompressError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Read the serialized form of a value
    pub async fn retrieve_raw(&self, key: &str) -> Result<Option<String>> {
        let cached = self
            .cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(key).cloned());

        let item = match cached {
            Some(item) => item,
            None => {
                let key = key.to_string();
                match self.durable(move |store| store.get(&key)).await? {
                    Some(item) => {
                        self.cache_insert(item.clone());
                        item
                    },
                    None => return Ok(None),
                }
            },
        };

        self.unpack(&item).await.map(Some)
    }

    async fn unpack(&self, item: &LocalStorageItem) -> Result<String> {
        if !item.compressed {
            return Ok(item.value.clone());
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(&item.value)?;
        let raw = self.service.decompress_bytes(&bytes, item.algorithm).await?;
        String::from_utf8(raw)
            .map_err(|e| CompressError::Decompression(format!("Invalid UTF-8 in {}: {e}", item.key)))
    }

    /// Stored record without decoding it
    pub fn item(&self, key: &str) -> Result<Option<LocalStorageItem>> {
        self.store.get(key)
    }

    /// Delete a value, returning whether it existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(key);
        }
        self.store.delete(key)
    }

    /// Delete every value
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        self.store.clear()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    /// Check if a key is stored
    pub fn contains(&self, key: &str) -> Result<bool> {
        if self.cache.lock().is_ok_and(|cache| cache.contains_key(key)) {
            return Ok(true);
        }
        Ok(self.store.get(key)?.is_some())
    }

    /// Aggregate storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let items = self.store.all()?;
        let total_original_size: usize = items.iter().map(|i| i.original_size).sum();
        let total_compressed_size: usize = items.iter().map(|i| i.compressed_size).sum();

        Ok(StorageStats {
            total_items: items.len(),
            compressed_items: items.iter().filter(|i| i.compressed).count(),
            total_original_size,
            total_compressed_size,
            average_compression_ratio: if total_original_size == 0 {
                1.0
            } else {
                total_compressed_size as f64 / total_original_size as f64
            },
            bytes_saved: total_original_size.saturating_sub(total_compressed_size),
            cache_size: self.cache_len(),
        })
    }

    /// Recompress stale uncompressed items at maximum level.
    ///
    /// Rewritten items keep their original timestamp.
    pub async fn optimize_storage(&self) -> Result<OptimizationReport> {
        let cutoff = chrono::Utc::now() - self.optimize_after;
        let stale = self
            .durable(move |store| store.uncompressed_before(cutoff))
            .await?;
        let options = CompressionOptions::new()
            .with_level(MAX_LEVEL)
            .with_threshold(OPTIMIZE_THRESHOLD);

        let mut report = OptimizationReport {
            items_scanned: stale.len(),
            ..Default::default()
        };
        for item in stale {
            if item.value.len() < OPTIMIZE_THRESHOLD {
                continue;
            }
            let packed = self
                .pack(&item.key, item.value.clone(), &options)
                .await
                .at(item.timestamp);
            if !packed.compressed {
                continue;
            }

            let stored = packed.clone();
            self.durable(move |store| store.put(&stored)).await?;
            if let Ok(mut cache) = self.cache.lock() {
                if cache.contains_key(&packed.key) {
                    cache.insert(packed.key.clone(), packed.clone());
                }
            }
            report.items_optimized += 1;
            report.bytes_saved += packed.bytes_saved();
        }

        info!(
            "Storage optimization: {} of {} stale items recompressed, {} bytes saved",
            report.items_optimized, report.items_scanned, report.bytes_saved
        );
        Ok(report)
    }

    /// Drop mirror entries written more than `max_age` ago
    pub fn cleanup_cache(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = chrono::Utc::now() - max_age;
        let Ok(mut cache) = self.cache.lock() else {
            return 0;
        };
        let before = cache.len();
        cache.retain(|_, item| item.timestamp >= cutoff);
        before - cache.len()
    }

    /// Run a durable store call on the blocking pool
    async fn durable<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DurableStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || call(&*store))
            .await
            .map_err(|e| CompressError::Storage(format!("Store task failed: {e}")))?
    }

    /// Entries in the in-memory mirror
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn cache_insert(&self, item: LocalStorageItem) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        if cache.len() >= self.max_cache_size && !cache.contains_key(&item.key) {
            // Any entry will do; the durable store still has it
            if let Some(victim) = cache.keys().next().cloned() {
                cache.remove(&victim);
            }
        }
        cache.insert(item.key.clone(), item);
    }
}
