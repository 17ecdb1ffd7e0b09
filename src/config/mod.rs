//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`NOTECOMP_*`)
//! - CLI arguments (for the `notecomp` binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::Algorithm;
use crate::error::{CompressError, Result};

/// Lowest accepted compression level
pub const MIN_LEVEL: u32 = 1;

/// Highest accepted compression level
pub const MAX_LEVEL: u32 = 9;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Compression service configuration
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Local storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CompressError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| CompressError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("NOTECOMP_ALGORITHM") {
            if let Ok(algorithm) = val.parse() {
                config.compression.algorithm = algorithm;
            }
        }
        if let Ok(val) = std::env::var("NOTECOMP_THRESHOLD") {
            if let Ok(val) = val.parse() {
                config.compression.threshold = val;
            }
        }
        if let Ok(val) = std::env::var("NOTECOMP_LEVEL") {
            if let Ok(val) = val.parse::<u32>() {
                config.compression.level = val.clamp(MIN_LEVEL, MAX_LEVEL);
            }
        }
        if let Ok(val) = std::env::var("NOTECOMP_ENABLED") {
            if let Ok(val) = val.parse() {
                config.compression.enabled = val;
            }
        }
        if let Ok(path) = std::env::var("NOTECOMP_STORAGE_PATH") {
            config.storage.path = Some(PathBuf::from(path));
        }

        config
    }

    /// Merge with another config (other takes precedence)
    ///
    /// A field in `other` only wins when it differs from the default, so a
    /// partial file layered over env values keeps the env settings it does
    /// not mention.
    pub fn merge(self, other: Self) -> Self {
        let (a, b, d) = (self.compression, other.compression, CompressionConfig::default());
        let compression = CompressionConfig {
            algorithm: prefer(a.algorithm, b.algorithm, d.algorithm),
            threshold: prefer(a.threshold, b.threshold, d.threshold),
            level: prefer(a.level, b.level, d.level),
            enabled: prefer(a.enabled, b.enabled, d.enabled),
            use_cache: prefer(a.use_cache, b.use_cache, d.use_cache),
            cache_capacity: prefer(a.cache_capacity, b.cache_capacity, d.cache_capacity),
        };

        let (a, b, d) = (self.storage, other.storage, StorageConfig::default());
        let storage = StorageConfig {
            // An unset path never clears one from the base
            path: b.path.filter(|path| Some(path) != d.path.as_ref()).or(a.path),
            compression_threshold: prefer(
                a.compression_threshold,
                b.compression_threshold,
                d.compression_threshold,
            ),
            max_cache_size: prefer(a.max_cache_size, b.max_cache_size, d.max_cache_size),
            optimize_after_days: prefer(
                a.optimize_after_days,
                b.optimize_after_days,
                d.optimize_after_days,
            ),
        };

        let (a, b, d) = (self.monitor, other.monitor, MonitorConfig::default());
        let monitor = MonitorConfig {
            max_events: prefer(a.max_events, b.max_events, d.max_events),
            max_alerts: prefer(a.max_alerts, b.max_alerts, d.max_alerts),
            slow_compression_ms: prefer(
                a.slow_compression_ms,
                b.slow_compression_ms,
                d.slow_compression_ms,
            ),
            poor_ratio_threshold: prefer(
                a.poor_ratio_threshold,
                b.poor_ratio_threshold,
                d.poor_ratio_threshold,
            ),
            memory_limit_bytes: prefer(
                a.memory_limit_bytes,
                b.memory_limit_bytes,
                d.memory_limit_bytes,
            ),
            error_rate_threshold: prefer(
                a.error_rate_threshold,
                b.error_rate_threshold,
                d.error_rate_threshold,
            ),
            health_check_interval_secs: prefer(
                a.health_check_interval_secs,
                b.health_check_interval_secs,
                d.health_check_interval_secs,
            ),
            metrics_window_secs: prefer(
                a.metrics_window_secs,
                b.metrics_window_secs,
                d.metrics_window_secs,
            ),
            cache_window_secs: prefer(a.cache_window_secs, b.cache_window_secs, d.cache_window_secs),
            health_window_secs: prefer(
                a.health_window_secs,
                b.health_window_secs,
                d.health_window_secs,
            ),
        };

        Self {
            compression,
            storage,
            monitor,
        }
    }
}

fn prefer<T: PartialEq>(base: T, other: T, default: T) -> T {
    if other != default {
        other
    } else {
        base
    }
}

/// Process-wide compression settings, read by every compression call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Default algorithm
    pub algorithm: Algorithm,

    /// Minimum payload size in bytes before compression is attempted
    pub threshold: usize,

    /// Compression intensity (1-9)
    pub level: u32,

    /// Enable compression (false = passthrough mode)
    pub enabled: bool,

    /// Serve repeated payloads from the fingerprint cache
    pub use_cache: bool,

    /// Maximum fingerprint cache entries
    pub cache_capacity: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Gzip,
            threshold: 1024,
            level: 6,
            enabled: true,
            use_cache: true,
            cache_capacity: 100,
        }
    }
}

/// Partial update applied with `CompressionService::update_config`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfigUpdate {
    /// New default algorithm
    pub algorithm: Option<Algorithm>,
    /// New threshold
    pub threshold: Option<usize>,
    /// New level (clamped to 1-9)
    pub level: Option<u32>,
    /// Enable/disable compression
    pub enabled: Option<bool>,
    /// Enable/disable the cache
    pub use_cache: Option<bool>,
}

impl CompressionConfig {
    /// Apply a partial update
    pub fn apply(&mut self, update: CompressionConfigUpdate) {
        if let Some(algorithm) = update.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(threshold) = update.threshold {
            self.threshold = threshold;
        }
        if let Some(level) = update.level {
            self.level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(use_cache) = update.use_cache {
            self.use_cache = use_cache;
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file (None = in-memory)
    pub path: Option<PathBuf>,

    /// Minimum serialized size in bytes before a value is compressed
    pub compression_threshold: usize,

    /// Maximum entries in the in-memory mirror
    pub max_cache_size: usize,

    /// Age in days after which uncompressed items are recompressed by
    /// `optimize_storage`
    pub optimize_after_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir().map(|p| p.join("notecomp").join("storage.db")),
            compression_threshold: 1024,
            max_cache_size: 1000,
            optimize_after_days: 7,
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Event ring buffer capacity
    pub max_events: usize,

    /// Alert ring buffer capacity
    pub max_alerts: usize,

    /// Compression time above which a performance alert fires (ms)
    pub slow_compression_ms: f64,

    /// compressed/original ratio above which a threshold alert fires
    pub poor_ratio_threshold: f64,

    /// Memory usage above which a critical alert fires (bytes)
    pub memory_limit_bytes: u64,

    /// Rolling error rate above which the health check alerts
    pub error_rate_threshold: f64,

    /// Health check period in seconds
    pub health_check_interval_secs: u64,

    /// Window for performance metrics in seconds
    pub metrics_window_secs: u64,

    /// Window for the cache hit rate in seconds
    pub cache_window_secs: u64,

    /// Window for the health check's rolling error rate in seconds
    pub health_window_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            max_alerts: 100,
            slow_compression_ms: 5000.0,
            poor_ratio_threshold: 0.8,
            memory_limit_bytes: 100 * 1024 * 1024, // 100 MB
            error_rate_threshold: 0.05,
            health_check_interval_secs: 60,
            metrics_window_secs: 24 * 60 * 60,
            cache_window_secs: 60 * 60,
            health_window_secs: 60 * 60,
        }
    }
}

impl MonitorConfig {
    /// Health check period
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    /// Performance metrics window
    pub fn metrics_window(&self) -> Duration {
        Duration::from_secs(self.metrics_window_secs)
    }

    /// Cache hit rate window
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }

    /// Health check error-rate window
    pub fn health_window(&self) -> Duration {
        Duration::from_secs(self.health_window_secs)
    }
}
