//! Content Compression Service: content-type aware compression.
//!
//! Detects the payload shape and picks threshold and codec from a per-type
//! table before delegating to [`CompressionService`]:
//!
//! | Content type | Threshold | Default codec | Estimated ratio |
//! |--------------|-----------|---------------|-----------------|
//! | text         | 512       | gzip          | 0.7             |
//! | html         | 1024      | brotli        | 0.3             |
//! | json         | 1024      | gzip          | 0.4             |
//! | markdown     | 1024      | gzip          | 0.6             |
//! | rich-text    | 2048      | brotli        | 0.4             |
//!
//! Results are tagged `"{codec}-{content-type}"` (e.g. `brotli-rich-text`);
//! the codec name never contains `-`, so splitting on the first `-`
//! recovers both parts.

mod detect;

pub use detect::{detect_content_type, optimize_for_compression, ContentType};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::Algorithm;
use crate::error::{CompressError, Result};
use crate::service::{CompressionOptions, CompressionResult, CompressionService, DecompressionResult};

/// Per-call options for [`ContentCompressionService::compress_content`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCompressionOptions {
    /// Skip detection and use this type
    pub content_type: Option<ContentType>,
    /// Codec override (defaults to the type's codec)
    pub algorithm: Option<Algorithm>,
    /// Level override
    pub level: Option<u32>,
    /// Threshold override (defaults to the type's threshold)
    pub threshold: Option<usize>,
    /// Consult the fingerprint cache
    pub use_cache: bool,
    /// Codec deadline
    pub timeout: Option<Duration>,
    /// Normalize the payload before compressing it
    pub optimize: bool,
}

impl Default for ContentCompressionOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            algorithm: None,
            level: None,
            threshold: None,
            use_cache: true,
            timeout: None,
            optimize: false,
        }
    }
}

/// Compression result tagged with the content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCompressionResult {
    /// Underlying compression result
    #[serde(flatten)]
    pub result: CompressionResult,
    /// Detected or declared type
    pub content_type: ContentType,
    /// `"{codec}-{content-type}"`
    pub algorithm_tag: String,
    /// Payload was normalized before compression
    pub optimized: bool,
}

/// Pre-compression advice for a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionRecommendation {
    /// Detected type
    pub content_type: ContentType,
    /// Codec suited to that type
    pub recommended_algorithm: Algorithm,
    /// Expected bytes saved, from the type's estimated ratio
    pub estimated_savings: usize,
    /// Payload reaches the type's threshold
    pub should_compress: bool,
}

/// Build the `"{codec}-{content-type}"` tag
pub fn algorithm_tag(algorithm: Algorithm, content_type: ContentType) -> String {
    format!("{}-{}", algorithm.name(), content_type.name())
}

/// Split a tag produced by [`algorithm_tag`]
pub fn parse_algorithm_tag(tag: &str) -> Result<(Algorithm, ContentType)> {
    let (codec, content_type) = tag
        .split_once('-')
        .ok_or_else(|| CompressError::InvalidAlgorithm(format!("Malformed tag: {tag}")))?;
    Ok((codec.parse()?, content_type.parse()?))
}

/// Content-type aware front end to the Compression Service
#[derive(Debug, Clone)]
pub struct ContentCompressionService {
    service: Arc<CompressionService>,
}

impl ContentCompressionService {
    /// Wrap a shared Compression Service
    pub fn new(service: Arc<CompressionService>) -> Self {
        Self { service }
    }

    /// Underlying Compression Service
    pub fn service(&self) -> &Arc<CompressionService> {
        &self.service
    }

    /// Compress with per-type threshold and codec
    pub async fn compress_content(
        &self,
        content: &str,
        options: &ContentCompressionOptions,
    ) -> ContentCompressionResult {
        let content_type = options
            .content_type
            .unwrap_or_else(|| detect_content_type(content));

        let payload = if options.optimize {
            optimize_for_compression(content, content_type)
        } else {
            content.into()
        };

        let mut compression = CompressionOptions::new()
            .with_algorithm(options.algorithm.unwrap_or(content_type.default_algorithm()))
            .with_threshold(options.threshold.unwrap_or(content_type.threshold()))
            .with_cache(options.use_cache);
        compression.level = options.level;
        compression.timeout = options.timeout;

        debug!(
            "Compressing {} bytes as {} (threshold {:?})",
            payload.len(),
            content_type,
            compression.threshold
        );
        let result = self.service.compress(&payload, &compression).await;

        ContentCompressionResult {
            algorithm_tag: algorithm_tag(result.algorithm, content_type),
            content_type,
            optimized: options.optimize && payload.as_ref() != content,
            result,
        }
    }

    /// Decompress bytes tagged by [`compress_content`](Self::compress_content)
    pub async fn decompress_content(&self, data: &[u8], tag: &str) -> DecompressionResult {
        match parse_algorithm_tag(tag) {
            Ok((algorithm, _)) => self.service.decompress(data, algorithm).await,
            Err(e) => {
                DecompressionResult::failure(data.len(), Algorithm::None, Duration::ZERO, e.to_string())
            },
        }
    }

    /// Type, codec and expected savings without compressing
    pub fn get_compression_recommendations(&self, content: &str) -> CompressionRecommendation {
        let content_type = detect_content_type(content);
        let size = content.len();
        CompressionRecommendation {
            content_type,
            recommended_algorithm: content_type.default_algorithm(),
            estimated_savings: (size as f64 * (1.0 - content_type.estimated_ratio())).round()
                as usize,
            should_compress: size >= content_type.threshold(),
        }
    }
}
