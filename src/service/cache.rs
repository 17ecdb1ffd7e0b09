//! Bounded content-addressed cache of compressed payloads.
//!
//! Keys are SHA-256 fingerprints over (algorithm, level, content). Content
//! changes produce new keys, so entries never need invalidation; the only
//! way out is capacity eviction, which drops the single oldest entry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::codec::Algorithm;

/// Fingerprint for a payload under a given algorithm and level
pub fn fingerprint(algorithm: Algorithm, level: u32, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(algorithm.name().as_bytes());
    hasher.update([0u8]);
    hasher.update(level.to_le_bytes());
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Cached compression output
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Compressed bytes
    pub compressed: Arc<[u8]>,
    /// Input size in bytes
    pub original_size: usize,
    /// Output size in bytes
    pub compressed_size: usize,
    /// Codec that produced the bytes
    pub algorithm: Algorithm,
    /// Insertion time
    pub timestamp: DateTime<Utc>,
    /// Insertion order, used for eviction
    seq: u64,
}

/// Fingerprint-keyed cache with oldest-first eviction
#[derive(Debug)]
pub struct CompressionCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    next_seq: u64,
}

impl CompressionCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Look up an entry
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Insert or replace an entry, returning the evicted key if any.
    ///
    /// Replacing an existing key never evicts.
    pub fn insert(
        &mut self,
        key: String,
        compressed: Arc<[u8]>,
        original_size: usize,
        algorithm: Algorithm,
    ) -> Option<String> {
        let evicted = if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        let compressed_size = compressed.len();
        self.entries.insert(
            key,
            CacheEntry {
                compressed,
                original_size,
                compressed_size,
                algorithm,
                timestamp: Utc::now(),
                seq,
            },
        );

        evicted
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    /// Check if a key is cached
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes())
    }

    #[test]
    fn test_fingerprint_depends_on_all_inputs() {
        let base = fingerprint(Algorithm::Gzip, 6, b"content");
        assert_eq!(base, fingerprint(Algorithm::Gzip, 6, b"content"));
        assert_ne!(base, fingerprint(Algorithm::Brotli, 6, b"content"));
        assert_ne!(base, fingerprint(Algorithm::Gzip, 7, b"content"));
        assert_ne!(base, fingerprint(Algorithm::Gzip, 6, b"content!"));
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut cache = CompressionCache::new(3);
        for key in ["a", "b", "c"] {
            assert!(cache.insert(key.into(), bytes(key), 10, Algorithm::Gzip).is_none());
        }

        let evicted = cache.insert("d".into(), bytes("d"), 10, Algorithm::Gzip);
        assert_eq!(evicted.as_deref(), Some("a"));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let mut cache = CompressionCache::new(2);
        cache.insert("a".into(), bytes("a"), 10, Algorithm::Gzip);
        cache.insert("b".into(), bytes("b"), 10, Algorithm::Gzip);

        assert!(cache
            .insert("a".into(), bytes("a2"), 10, Algorithm::Brotli)
            .is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().algorithm, Algorithm::Brotli);

        // "b" is now the oldest
        let evicted = cache.insert("c".into(), bytes("c"), 10, Algorithm::Gzip);
        assert_eq!(evicted.as_deref(), Some("b"));
    }
}
