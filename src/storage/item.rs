//! Stored record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Algorithm;

/// One persisted key/value record.
///
/// `value` holds base64 of the compressed bytes when `compressed` is set,
/// otherwise the serialized value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalStorageItem {
    /// Record key
    pub key: String,
    /// Stored form of the value
    pub value: String,
    /// `value` is base64 of compressed bytes
    pub compressed: bool,
    /// Serialized size in bytes
    pub original_size: usize,
    /// Compressed size in bytes (equals `original_size` when uncompressed)
    pub compressed_size: usize,
    /// compressed_size / original_size
    pub compression_ratio: f64,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
    /// Codec used, `none` when uncompressed
    pub algorithm: Algorithm,
}

impl LocalStorageItem {
    /// Record holding the serialized value as-is
    pub fn uncompressed(key: impl Into<String>, serialized: String) -> Self {
        let size = serialized.len();
        Self {
            key: key.into(),
            value: serialized,
            compressed: false,
            original_size: size,
            compressed_size: size,
            compression_ratio: 1.0,
            timestamp: Utc::now(),
            algorithm: Algorithm::None,
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Bytes saved by compression
    pub fn bytes_saved(&self) -> usize {
        self.original_size.saturating_sub(self.compressed_size)
    }
}
