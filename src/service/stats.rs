//! Cumulative compression statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running totals owned by the Compression Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Sum of input sizes over successful compressions
    pub total_original_size: u64,
    /// Sum of output sizes over successful compressions
    pub total_compressed_size: u64,
    /// total_compressed_size / total_original_size
    pub average_ratio: f64,
    /// Successful compressions (cache hits excluded)
    pub compression_count: u64,
    /// Failed compressions
    pub failure_count: u64,
    /// Streaming mean of compression time in milliseconds
    pub average_compression_time_ms: f64,
    /// Time of the last successful compression
    pub last_compression: Option<DateTime<Utc>>,
    /// Lookups served from the fingerprint cache
    pub cache_hits: u64,
    /// Lookups that missed the fingerprint cache
    pub cache_misses: u64,
}

impl Default for CompressionStats {
    fn default() -> Self {
        Self {
            total_original_size: 0,
            total_compressed_size: 0,
            average_ratio: 1.0,
            compression_count: 0,
            failure_count: 0,
            average_compression_time_ms: 0.0,
            last_compression: None,
            cache_hits: 0,
            cache_misses: 0,
        }
    }
}

impl CompressionStats {
    /// Record a successful compression
    pub fn record_success(&mut self, original_size: usize, compressed_size: usize, time_ms: f64) {
        self.compression_count += 1;
        self.total_original_size += original_size as u64;
        self.total_compressed_size += compressed_size as u64;

        if self.total_original_size > 0 {
            self.average_ratio =
                self.total_compressed_size as f64 / self.total_original_size as f64;
        }

        let n = self.compression_count as f64;
        self.average_compression_time_ms =
            (self.average_compression_time_ms * (n - 1.0) + time_ms) / n;
        self.last_compression = Some(Utc::now());
    }

    /// Record a failed compression
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Record a cache hit
    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Record a cache miss
    pub fn record_cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    /// failures / attempts
    pub fn error_rate(&self) -> f64 {
        let attempts = self.compression_count + self.failure_count;
        if attempts == 0 {
            0.0
        } else {
            self.failure_count as f64 / attempts as f64
        }
    }

    /// hits / lookups
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Bytes saved over all successful compressions
    pub fn bytes_saved(&self) -> u64 {
        self.total_original_size
            .saturating_sub(self.total_compressed_size)
    }
}

/// Derived service metrics for monitoring views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    /// Average compressed/original ratio
    pub compression_ratio: f64,
    /// Average compression time in milliseconds
    pub compression_time_ms: f64,
    /// Process memory in bytes, when the host reports it
    pub memory_usage: Option<u64>,
    /// Cache hits / cache lookups
    pub cache_hit_rate: f64,
    /// Failures / attempts
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_mean_and_ratio() {
        let mut stats = CompressionStats::default();
        stats.record_success(1000, 700, 10.0);
        stats.record_success(2000, 600, 20.0);
        stats.record_success(1000, 100, 30.0);

        assert_eq!(stats.compression_count, 3);
        assert_eq!(stats.total_original_size, 4000);
        assert_eq!(stats.total_compressed_size, 1400);
        assert!((stats.average_ratio - 0.35).abs() < 1e-9);
        assert!((stats.average_compression_time_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats.bytes_saved(), 2600);
        assert!(stats.last_compression.is_some());
    }

    #[test]
    fn test_rates() {
        let mut stats = CompressionStats::default();
        assert!(stats.error_rate().abs() < f64::EPSILON);
        assert!(stats.cache_hit_rate().abs() < f64::EPSILON);

        stats.record_success(100, 50, 1.0);
        stats.record_failure();
        stats.record_cache_miss();
        stats.record_cache_hit();
        stats.record_cache_hit();

        assert!((stats.error_rate() - 0.5).abs() < 1e-9);
        assert!((stats.cache_hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
