//! Compression Service: thresholds, algorithm selection, caching and stats.
//!
//! Every compression in the crate goes through [`CompressionService`]. It
//! owns the process-wide [`CompressionConfig`], the fingerprint cache and
//! the cumulative [`CompressionStats`]; nothing else mutates them.
//!
//! # Pipeline
//!
//! ```text
//! compress(data, options)
//!   │
//!   ├─ disabled? ───────────────────────────> identity
//!   ├─ len < threshold? ────────────────────> identity
//!   ├─ algorithm == none? ──────────────────> identity
//!   ├─ fingerprint cached? ─────────────────> cached result (time = 0)
//!   │
//!   ├─ gzip | brotli ──> codec
//!   ├─ auto ───────────> both codecs, keep smaller (ties: gzip)
//!   │
//!   ├─ ok  ──> cache insert, stats.record_success ──> result
//!   └─ err ──> stats.record_failure ────────────────> failure (identity)
//! ```
//!
//! Codec faults never escape `compress` / `decompress`: they become results
//! with `success == false`.
//!
//! # Concurrency
//!
//! Config, stats and cache sit behind their own locks, which are never held
//! across an `.await`. Two concurrent calls for the same content may both
//! miss and both insert; the second write wins and is equivalent.

mod cache;
mod result;
mod stats;

pub use cache::{fingerprint, CacheEntry, CompressionCache};
pub use result::{CompressionOptions, CompressionResult, DecompressionResult};
pub use stats::{CompressionStats, ServiceMetrics};

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::codec::{Algorithm, CodecAdapter, CodecKind};
use crate::config::{CompressionConfig, CompressionConfigUpdate, MAX_LEVEL, MIN_LEVEL};
use crate::error::{CompressError, Result};
use crate::monitor::{MemoryProbe, SysinfoProbe};

/// Gzip streams start with these two bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Central compression orchestrator
pub struct CompressionService {
    config: RwLock<CompressionConfig>,
    stats: Mutex<CompressionStats>,
    cache: Mutex<CompressionCache>,
    adapter: CodecAdapter,
    memory: Arc<dyn MemoryProbe>,
}

impl Default for CompressionService {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}

impl std::fmt::Debug for CompressionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionService")
            .field("config", &self.config())
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

impl CompressionService {
    /// Create a service with the given configuration
    pub fn new(config: CompressionConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            config: RwLock::new(config),
            stats: Mutex::new(CompressionStats::default()),
            cache: Mutex::new(CompressionCache::new(capacity)),
            adapter: CodecAdapter::new(),
            memory: Arc::new(SysinfoProbe::new()),
        }
    }

    /// Use a specific codec adapter
    pub fn with_adapter(mut self, adapter: CodecAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// Use a specific memory probe
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = probe;
        self
    }

    /// Codec adapter in use
    pub fn adapter(&self) -> &CodecAdapter {
        &self.adapter
    }

    /// Current configuration
    pub fn config(&self) -> CompressionConfig {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the configuration
    pub fn set_config(&self, config: CompressionConfig) {
        self.resize_cache(config.cache_capacity);
        if let Ok(mut current) = self.config.write() {
            *current = config;
        }
    }

    /// Apply a partial configuration update
    pub fn update_config(&self, update: CompressionConfigUpdate) {
        if let Ok(mut current) = self.config.write() {
            current.apply(update);
        }
    }

    fn resize_cache(&self, capacity: usize) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.capacity() != capacity.max(1) {
                *cache = CompressionCache::new(capacity);
            }
        }
    }

    /// Compress a string payload
    pub async fn compress(&self, data: &str, options: &CompressionOptions) -> CompressionResult {
        self.compress_bytes(data.as_bytes(), options).await
    }

    /// Compress a byte payload
    pub async fn compress_bytes(
        &self,
        data: &[u8],
        options: &CompressionOptions,
    ) -> CompressionResult {
        let start = Instant::now();
        let config = self.config();

        if !config.enabled {
            return CompressionResult::identity(data.len(), start.elapsed());
        }

        let threshold = options.threshold.unwrap_or(config.threshold);
        if data.len() < threshold {
            return CompressionResult::identity(data.len(), start.elapsed());
        }

        let algorithm = options.algorithm.unwrap_or(config.algorithm);
        let candidates: &[CodecKind] = match algorithm {
            Algorithm::Gzip => &[CodecKind::Gzip],
            Algorithm::Brotli => &[CodecKind::Brotli],
            Algorithm::Auto => &CodecKind::ALL,
            Algorithm::None => return CompressionResult::identity(data.len(), start.elapsed()),
        };
        let level = options
            .level
            .unwrap_or(config.level)
            .clamp(MIN_LEVEL, MAX_LEVEL);

        let use_cache = config.use_cache && options.use_cache;
        let key = fingerprint(algorithm, level, data);
        if use_cache {
            if let Some(hit) = self.cached_result(&key) {
                debug!(
                    "Cache hit for {} bytes ({}, level {})",
                    data.len(),
                    algorithm,
                    level
                );
                return hit;
            }
        }

        let payload: Arc<[u8]> = Arc::from(data);
        let outcome = match options.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.encode_best(&payload, candidates, level))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CompressError::Timeout(limit.as_millis() as u64)),
                }
            },
            None => self.encode_best(&payload, candidates, level).await,
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok((kind, compressed)) => {
                let compressed: Arc<[u8]> = Arc::from(compressed);
                if use_cache {
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.insert(key, Arc::clone(&compressed), data.len(), kind.algorithm());
                    }
                }
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_success(
                        data.len(),
                        compressed.len(),
                        elapsed.as_secs_f64() * 1000.0,
                    );
                }
                CompressionResult::compressed(
                    compressed.to_vec(),
                    data.len(),
                    kind.algorithm(),
                    elapsed,
                )
            },
            Err(e) => {
                warn!("Compression of {} bytes with {} failed: {}", data.len(), algorithm, e);
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_failure();
                }
                CompressionResult::failure(data.len(), elapsed, e.to_string())
            },
        }
    }

    fn cached_result(&self, key: &str) -> Option<CompressionResult> {
        let hit = {
            let cache = self.cache.lock().ok()?;
            cache.get(key).map(|entry| {
                let mut result = CompressionResult::compressed(
                    entry.compressed.to_vec(),
                    entry.original_size,
                    entry.algorithm,
                    Duration::ZERO,
                );
                result.cache_hit = true;
                result
            })
        };

        if let Ok(mut stats) = self.stats.lock() {
            if hit.is_some() {
                stats.record_cache_hit();
            } else {
                stats.record_cache_miss();
            }
        }
        hit
    }

    /// Run each candidate codec and keep the smallest output.
    ///
    /// Ties keep the earlier candidate. A failing candidate is skipped as
    /// long as another one succeeds.
    async fn encode_best(
        &self,
        data: &Arc<[u8]>,
        candidates: &[CodecKind],
        level: u32,
    ) -> Result<(CodecKind, Vec<u8>)> {
        let mut best: Option<(CodecKind, Vec<u8>)> = None;
        let mut last_error = None;

        for &kind in candidates {
            match self.adapter.encode(Arc::clone(data), kind, level).await {
                Ok(encoded) => {
                    let is_better = match &best {
                        None => true,
                        Some((_, current)) => encoded.len() < current.len(),
                    };
                    if is_better {
                        best = Some((kind, encoded));
                    }
                },
                Err(e) => {
                    debug!("Codec {} unavailable for this payload: {}", kind, e);
                    last_error = Some(e);
                },
            }
        }

        best.ok_or_else(|| {
            last_error
                .unwrap_or_else(|| CompressError::Compression("No codec candidates".to_string()))
        })
    }

    /// Decompress bytes produced by [`compress`](Self::compress) into text
    pub async fn decompress(&self, data: &[u8], algorithm: Algorithm) -> DecompressionResult {
        let start = Instant::now();
        let outcome = self
            .decompress_bytes(data, algorithm)
            .await
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| CompressError::Decompression(format!("Invalid UTF-8: {e}")))
            });

        match outcome {
            Ok(text) => DecompressionResult::ok(text, data.len(), algorithm, start.elapsed()),
            Err(e) => {
                warn!("Decompression of {} bytes with {} failed: {}", data.len(), algorithm, e);
                DecompressionResult::failure(data.len(), algorithm, start.elapsed(), e.to_string())
            },
        }
    }

    /// Decompress bytes, propagating codec errors.
    ///
    /// `Auto` sniffs the gzip magic bytes and falls back to brotli.
    pub async fn decompress_bytes(&self, data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
        let kind = match algorithm {
            Algorithm::None => return Ok(data.to_vec()),
            Algorithm::Gzip => CodecKind::Gzip,
            Algorithm::Brotli => CodecKind::Brotli,
            Algorithm::Auto if data.starts_with(&GZIP_MAGIC) => CodecKind::Gzip,
            Algorithm::Auto => CodecKind::Brotli,
        };
        self.adapter.decode(Arc::from(data), kind).await
    }

    /// Snapshot of the cumulative statistics
    pub fn get_stats(&self) -> CompressionStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Reset the cumulative statistics
    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = CompressionStats::default();
        }
    }

    /// Derived metrics for monitoring views
    pub fn get_metrics(&self) -> ServiceMetrics {
        let stats = self.get_stats();
        ServiceMetrics {
            compression_ratio: stats.average_ratio,
            compression_time_ms: stats.average_compression_time_ms,
            memory_usage: self.memory.memory_usage(),
            cache_hit_rate: stats.cache_hit_rate(),
            error_rate: stats.error_rate(),
        }
    }

    /// Number of cached fingerprints
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Drop every cached fingerprint
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{FixedMemoryProbe, NoMemoryProbe};

    fn service() -> CompressionService {
        CompressionService::default().with_memory_probe(Arc::new(NoMemoryProbe))
    }

    fn note(n: usize) -> String {
        "Remember to water the plants and call the landlord. ".repeat(n)
    }

    #[tokio::test]
    async fn test_below_threshold_is_identity() {
        let service = service();
        let result = service.compress("short note", &CompressionOptions::new()).await;

        assert!(result.success);
        assert_eq!(result.algorithm, Algorithm::None);
        assert_eq!(result.compressed_size, result.original_size);
        assert!((result.ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(service.get_stats().compression_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_is_identity() {
        let service = service();
        service.update_config(CompressionConfigUpdate {
            enabled: Some(false),
            ..Default::default()
        });

        let result = service.compress(&note(100), &CompressionOptions::new()).await;
        assert_eq!(result.algorithm, Algorithm::None);
        assert!(result.compressed_data.is_none());
    }

    #[tokio::test]
    async fn test_roundtrip_each_codec() {
        let service = service();
        let content = note(50);

        for algorithm in [Algorithm::Gzip, Algorithm::Brotli] {
            let options = CompressionOptions::new().with_algorithm(algorithm);
            let result = service.compress(&content, &options).await;
            assert!(result.success);
            assert_eq!(result.algorithm, algorithm);
            assert!(result.compressed_size < result.original_size);

            let bytes = result.compressed_data.unwrap();
            let back = service.decompress(&bytes, result.algorithm).await;
            assert!(back.success);
            assert_eq!(back.data.as_deref(), Some(content.as_str()));
        }
    }

    #[tokio::test]
    async fn test_auto_keeps_smaller_output() {
        let service = service();
        let content = note(80);
        let gzip_len = service
            .adapter()
            .encode_blocking(content.as_bytes(), CodecKind::Gzip, 6)
            .unwrap()
            .len();
        let brotli_len = service
            .adapter()
            .encode_blocking(content.as_bytes(), CodecKind::Brotli, 6)
            .unwrap()
            .len();

        let options = CompressionOptions::new().with_algorithm(Algorithm::Auto);
        let result = service.compress(&content, &options).await;

        assert_eq!(result.compressed_size, gzip_len.min(brotli_len));
        let expected = if brotli_len < gzip_len {
            Algorithm::Brotli
        } else {
            Algorithm::Gzip
        };
        assert_eq!(result.algorithm, expected);
    }

    #[tokio::test]
    async fn test_auto_tolerates_missing_codec() {
        let service = service().with_adapter(CodecAdapter::new().without(CodecKind::Brotli));
        let options = CompressionOptions::new().with_algorithm(Algorithm::Auto);

        let result = service.compress(&note(40), &options).await;
        assert!(result.success);
        assert_eq!(result.algorithm, Algorithm::Gzip);
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let service = service();
        let content = note(40);
        let options = CompressionOptions::new();

        let first = service.compress(&content, &options).await;
        let second = service.compress(&content, &options).await;

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.compression_time, Duration::ZERO);
        assert_eq!(second.compressed_size, first.compressed_size);
        assert!((second.ratio - first.ratio).abs() < f64::EPSILON);
        assert_eq!(second.compressed_data, first.compressed_data);

        let stats = service.get_stats();
        assert_eq!(stats.compression_count, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_cache_bypass() {
        let service = service();
        let content = note(40);
        let options = CompressionOptions::new().with_cache(false);

        service.compress(&content, &options).await;
        let second = service.compress(&content, &options).await;

        assert!(!second.cache_hit);
        assert_eq!(service.cache_len(), 0);
        assert_eq!(service.get_stats().compression_count, 2);
    }

    #[tokio::test]
    async fn test_cache_capacity_is_bounded() {
        let service = CompressionService::new(CompressionConfig {
            cache_capacity: 5,
            threshold: 0,
            ..Default::default()
        })
        .with_memory_probe(Arc::new(NoMemoryProbe));

        for i in 0..6 {
            service
                .compress(&format!("payload number {i}"), &CompressionOptions::new())
                .await;
        }
        assert_eq!(service.cache_len(), 5);

        // The first payload was evicted and compresses again
        let again = service
            .compress("payload number 0", &CompressionOptions::new())
            .await;
        assert!(!again.cache_hit);
    }

    #[tokio::test]
    async fn test_unsupported_codec_becomes_failure() {
        let service = service().with_adapter(CodecAdapter::new().without(CodecKind::Brotli));
        let options = CompressionOptions::new().with_algorithm(Algorithm::Brotli);

        let result = service.compress(&note(40), &options).await;
        assert!(!result.success);
        assert_eq!(result.algorithm, Algorithm::None);
        assert!((result.ratio - 1.0).abs() < f64::EPSILON);
        assert!(result.error.unwrap().contains("Unsupported"));
        assert_eq!(service.get_stats().failure_count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_payload_decompression_fails() {
        let service = service();
        let result = service.decompress(b"not compressed", Algorithm::Gzip).await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_auto_decompression_sniffs_codec() {
        let service = service();
        let content = note(30);

        for algorithm in [Algorithm::Gzip, Algorithm::Brotli] {
            let options = CompressionOptions::new().with_algorithm(algorithm);
            let bytes = service.compress(&content, &options).await.compressed_data.unwrap();
            let back = service.decompress(&bytes, Algorithm::Auto).await;
            assert_eq!(back.data.as_deref(), Some(content.as_str()));
        }
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let service = service();
        let mut original = 0u64;
        let mut compressed = 0u64;

        for i in 1..=4 {
            let result = service
                .compress(&note(20 * i), &CompressionOptions::new())
                .await;
            original += result.original_size as u64;
            compressed += result.compressed_size as u64;
        }

        let stats = service.get_stats();
        assert_eq!(stats.compression_count, 4);
        assert_eq!(stats.total_original_size, original);
        assert_eq!(stats.total_compressed_size, compressed);
        assert!((stats.average_ratio - compressed as f64 / original as f64).abs() < 1e-12);

        service.reset_stats();
        assert_eq!(service.get_stats(), CompressionStats::default());
    }

    #[tokio::test]
    async fn test_metrics() {
        let service = CompressionService::default()
            .with_memory_probe(Arc::new(FixedMemoryProbe::new(4096)));
        let content = note(40);
        service.compress(&content, &CompressionOptions::new()).await;
        service.compress(&content, &CompressionOptions::new()).await;

        let metrics = service.get_metrics();
        assert_eq!(metrics.memory_usage, Some(4096));
        assert!((metrics.cache_hit_rate - 0.5).abs() < 1e-9);
        assert!(metrics.error_rate.abs() < f64::EPSILON);
        assert!(metrics.compression_ratio < 1.0);
    }
}
