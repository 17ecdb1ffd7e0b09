//! Compression options and result values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::Algorithm;

/// Per-call overrides for the process-wide [`CompressionConfig`].
///
/// [`CompressionConfig`]: crate::config::CompressionConfig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    /// Algorithm override
    pub algorithm: Option<Algorithm>,
    /// Level override (1-9)
    pub level: Option<u32>,
    /// Threshold override in bytes
    pub threshold: Option<usize>,
    /// Consult and populate the fingerprint cache
    pub use_cache: bool,
    /// Deadline for the codec call
    pub timeout: Option<Duration>,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            level: None,
            threshold: None,
            use_cache: true,
            timeout: None,
        }
    }
}

impl CompressionOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Set level
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Set threshold
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Enable or disable the cache for this call
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set a codec deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a single compression attempt.
///
/// `algorithm == None` with `ratio == 1.0` marks a skip: the payload was
/// below threshold, compression was disabled, or the attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Input size in bytes
    pub original_size: usize,
    /// Output size in bytes
    pub compressed_size: usize,
    /// compressed_size / original_size
    pub ratio: f64,
    /// Codec that produced the output
    pub algorithm: Algorithm,
    /// Wall time spent, zero when served from cache
    pub compression_time: Duration,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Error message on failure
    pub error: Option<String>,
    /// Compressed bytes (absent for skips and failures)
    #[serde(skip)]
    pub compressed_data: Option<Vec<u8>>,
    /// Served from the fingerprint cache
    #[serde(default)]
    pub cache_hit: bool,
}

impl CompressionResult {
    /// Result for a payload that was not compressed
    pub fn identity(original_size: usize, elapsed: Duration) -> Self {
        Self {
            original_size,
            compressed_size: original_size,
            ratio: 1.0,
            algorithm: Algorithm::None,
            compression_time: elapsed,
            success: true,
            error: None,
            compressed_data: None,
            cache_hit: false,
        }
    }

    /// Result for a failed attempt
    pub fn failure(original_size: usize, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::identity(original_size, elapsed)
        }
    }

    /// Result carrying compressed bytes
    pub fn compressed(
        data: Vec<u8>,
        original_size: usize,
        algorithm: Algorithm,
        elapsed: Duration,
    ) -> Self {
        let compressed_size = data.len();
        Self {
            original_size,
            compressed_size,
            ratio: ratio(original_size, compressed_size),
            algorithm,
            compression_time: elapsed,
            success: true,
            error: None,
            compressed_data: Some(data),
            cache_hit: false,
        }
    }

    /// Compression time in milliseconds
    pub fn compression_time_ms(&self) -> f64 {
        self.compression_time.as_secs_f64() * 1000.0
    }

    /// True when no codec ran (skip or failure)
    pub fn is_identity(&self) -> bool {
        self.algorithm == Algorithm::None
    }

    /// Savings percentage (0-100, negative when output grew)
    pub fn savings_percent(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }

    /// Check if compression was beneficial
    pub fn is_beneficial(&self) -> bool {
        self.success && self.compressed_size < self.original_size
    }

    /// Stored payload: compressed bytes, or the original when nothing ran
    pub fn payload_or(&self, original: &[u8]) -> Vec<u8> {
        self.compressed_data
            .clone()
            .unwrap_or_else(|| original.to_vec())
    }
}

/// Outcome of a single decompression attempt.
///
/// Callers must check `success` before trusting `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompressionResult {
    /// Decompressed text
    pub data: Option<String>,
    /// Input size in bytes
    pub compressed_size: usize,
    /// Output size in bytes
    pub decompressed_size: usize,
    /// Codec used
    pub algorithm: Algorithm,
    /// Wall time spent
    pub decompression_time: Duration,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Error message on failure
    pub error: Option<String>,
}

impl DecompressionResult {
    /// Successful decompression
    pub fn ok(data: String, compressed_size: usize, algorithm: Algorithm, elapsed: Duration) -> Self {
        Self {
            decompressed_size: data.len(),
            data: Some(data),
            compressed_size,
            algorithm,
            decompression_time: elapsed,
            success: true,
            error: None,
        }
    }

    /// Failed decompression
    pub fn failure(
        compressed_size: usize,
        algorithm: Algorithm,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            data: None,
            compressed_size,
            decompressed_size: 0,
            algorithm,
            decompression_time: elapsed,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Decompression time in milliseconds
    pub fn decompression_time_ms(&self) -> f64 {
        self.decompression_time.as_secs_f64() * 1000.0
    }
}

/// compressed / original, 1.0 for empty input
pub(crate) fn ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        1.0
    } else {
        compressed as f64 / original as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_result() {
        let result = CompressionResult::identity(42, Duration::from_millis(1));
        assert!(result.success);
        assert!(result.is_identity());
        assert_eq!(result.compressed_size, 42);
        assert!((result.ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.payload_or(b"raw"), b"raw".to_vec());
    }

    #[test]
    fn test_failure_result() {
        let result = CompressionResult::failure(10, Duration::ZERO, "boom");
        assert!(!result.success);
        assert!(result.is_identity());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_compressed_ratio() {
        let result =
            CompressionResult::compressed(vec![0; 25], 100, Algorithm::Gzip, Duration::ZERO);
        assert!((result.ratio - 0.25).abs() < f64::EPSILON);
        assert!((result.savings_percent() - 75.0).abs() < 1e-9);
        assert!(result.is_beneficial());
    }

    #[test]
    fn test_empty_input_ratio() {
        assert!((ratio(0, 0) - 1.0).abs() < f64::EPSILON);
    }
}
