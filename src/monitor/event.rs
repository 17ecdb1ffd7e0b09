//! Monitor events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::Algorithm;
use crate::service::{CompressionResult, DecompressionResult};

/// Kind of recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A compression attempt
    Compression,
    /// A decompression attempt
    Decompression,
    /// A failure outside a compress/decompress call
    Error,
}

/// One recorded operation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionEvent {
    /// Event id
    pub id: Uuid,
    /// When the operation finished
    pub timestamp: DateTime<Utc>,
    /// Kind of operation
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Codec involved
    pub algorithm: Algorithm,
    /// Uncompressed size in bytes
    pub original_size: usize,
    /// Compressed size in bytes
    pub compressed_size: usize,
    /// Wall time in milliseconds
    pub compression_time_ms: f64,
    /// Whether the operation succeeded
    pub success: bool,
    /// Error message on failure
    pub error: Option<String>,
    /// Free-form caller context (e.g. "note:42")
    pub context: Option<String>,
    /// Served from the fingerprint cache
    #[serde(default)]
    pub cache_hit: bool,
}

impl CompressionEvent {
    /// Create an event stamped now
    pub fn new(
        event_type: EventType,
        algorithm: Algorithm,
        original_size: usize,
        compressed_size: usize,
        compression_time_ms: f64,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            algorithm,
            original_size,
            compressed_size,
            compression_time_ms,
            success,
            error: None,
            context: None,
            cache_hit: false,
        }
    }

    /// Event for a compression result
    pub fn from_compression(result: &CompressionResult) -> Self {
        let mut event = Self::new(
            EventType::Compression,
            result.algorithm,
            result.original_size,
            result.compressed_size,
            result.compression_time_ms(),
            result.success,
        );
        event.error = result.error.clone();
        event.cache_hit = result.cache_hit;
        event
    }

    /// Event for a decompression result
    pub fn from_decompression(result: &DecompressionResult) -> Self {
        let mut event = Self::new(
            EventType::Decompression,
            result.algorithm,
            result.decompressed_size,
            result.compressed_size,
            result.decompression_time_ms(),
            result.success,
        );
        event.error = result.error.clone();
        event
    }

    /// Failure event
    pub fn error(algorithm: Algorithm, message: impl Into<String>) -> Self {
        let mut event = Self::new(EventType::Error, algorithm, 0, 0, 0.0, false);
        event.error = Some(message.into());
        event
    }

    /// Attach caller context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// compressed / original, if the original size is known
    pub fn ratio(&self) -> Option<f64> {
        (self.original_size > 0).then(|| self.compressed_size as f64 / self.original_size as f64)
    }
}
