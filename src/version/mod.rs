//! Version/Delta Compression Service.
//!
//! Stores a note version either as the compressed full text or as a
//! compressed line delta against the previous version, whichever is smaller:
//!
//! ```text
//! compress_version(current, base, options)
//!   │
//!   ├─ full  = compress(current)
//!   ├─ delta mode off / no base ─────────────> full
//!   ├─ delta = Delta::compute(base, current).encode()
//!   └─ delta.len() < full.size ? compress(delta) : full
//! ```
//!
//! A delta payload only decodes against the exact base it was computed
//! from. Neither the base nor its checksum is embedded in the payload; the
//! result carries the base's CRC-32 so a wrong base fails with
//! [`CompressError::DeltaBaseMismatch`] instead of producing wrong text.

mod delta;

pub use delta::{
    checksum, diff_lines, differences, kept_lines, verify_base, Delta, DeltaOp, LineDifference,
};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::Algorithm;
use crate::error::{CompressError, Result};
use crate::service::{CompressionOptions, CompressionResult, CompressionService};

/// Per-call options for [`VersionCompressionService::compress_version`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionCompressionOptions {
    /// Try a delta against the base version
    pub use_delta_compression: bool,
    /// Codec override
    pub algorithm: Option<Algorithm>,
    /// Level override
    pub level: Option<u32>,
    /// Threshold override
    pub threshold: Option<usize>,
    /// Consult the fingerprint cache
    pub use_cache: bool,
    /// Codec deadline
    pub timeout: Option<Duration>,
}

impl Default for VersionCompressionOptions {
    fn default() -> Self {
        Self {
            use_delta_compression: true,
            algorithm: None,
            level: None,
            threshold: None,
            use_cache: true,
            timeout: None,
        }
    }
}

impl VersionCompressionOptions {
    fn compression_options(&self) -> CompressionOptions {
        CompressionOptions {
            algorithm: self.algorithm,
            level: self.level,
            threshold: self.threshold,
            use_cache: self.use_cache,
            timeout: self.timeout,
        }
    }
}

/// A stored version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionCompressionResult {
    /// Compression of whichever form was kept
    #[serde(flatten)]
    pub result: CompressionResult,
    /// Bytes to persist (compressed, or raw when compression was skipped)
    #[serde(skip)]
    pub payload: Vec<u8>,
    /// Payload is a delta against the base
    pub delta_compression: bool,
    /// Stored size of the delta, when one was kept
    pub delta_size: Option<usize>,
    /// CRC-32 of the base the delta needs
    pub base_checksum: Option<u32>,
}

/// Outcome of comparing an original version against a decompressed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Texts are byte-identical
    pub is_valid: bool,
    /// 1.0 when identical, otherwise 2 * kept lines / total lines
    pub similarity: f64,
    /// Differing line ranges
    pub differences: Vec<LineDifference>,
}

/// Compare two versions line by line
pub fn validate_version_integrity(original: &str, decompressed: &str) -> IntegrityReport {
    if original == decompressed {
        return IntegrityReport {
            is_valid: true,
            similarity: 1.0,
            differences: Vec::new(),
        };
    }

    let ops = diff_lines(original, decompressed);
    let total = original.split('\n').count() + decompressed.split('\n').count();
    IntegrityReport {
        is_valid: false,
        similarity: 2.0 * kept_lines(&ops) as f64 / total as f64,
        differences: differences(&ops),
    }
}

/// Normalize a version before storing it: `\n` line endings, no trailing
/// whitespace, at most one blank line in a row.
pub fn optimize_version_data(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in unified.split('\n') {
        let line = line.trim_end_matches([' ', '\t']);
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        out.push(line);
    }
    out.join("\n")
}

/// Delta-aware front end to the Compression Service
#[derive(Debug, Clone)]
pub struct VersionCompressionService {
    service: Arc<CompressionService>,
}

impl VersionCompressionService {
    /// Wrap a shared Compression Service
    pub fn new(service: Arc<CompressionService>) -> Self {
        Self { service }
    }

    /// Underlying Compression Service
    pub fn service(&self) -> &Arc<CompressionService> {
        &self.service
    }

    /// Compress a version, as a delta against `base` when that is smaller
    pub async fn compress_version(
        &self,
        current: &str,
        base: Option<&str>,
        options: &VersionCompressionOptions,
    ) -> VersionCompressionResult {
        let compression = options.compression_options();
        let full = self.service.compress(current, &compression).await;

        let base = match base {
            Some(base) if options.use_delta_compression => base,
            _ => return Self::full_version(current, full),
        };

        let encoded = Delta::compute(base, current).encode();
        if encoded.len() >= full.compressed_size {
            debug!(
                "Delta not smaller ({} vs {} bytes), storing full version",
                encoded.len(),
                full.compressed_size
            );
            return Self::full_version(current, full);
        }

        let packed = self.service.compress(&encoded, &compression).await;
        // A delta the codec cannot shrink is stored as-is
        let packed = if packed.is_beneficial() {
            packed
        } else {
            CompressionResult::identity(encoded.len(), packed.compression_time)
        };
        debug!(
            "Storing version as delta: {} bytes vs {} full",
            packed.compressed_size, full.compressed_size
        );
        VersionCompressionResult {
            payload: packed.payload_or(encoded.as_bytes()),
            delta_compression: true,
            delta_size: Some(packed.compressed_size),
            base_checksum: Some(checksum(base)),
            result: packed,
        }
    }

    fn full_version(current: &str, full: CompressionResult) -> VersionCompressionResult {
        VersionCompressionResult {
            payload: full.payload_or(current.as_bytes()),
            delta_compression: false,
            delta_size: None,
            base_checksum: None,
            result: full,
        }
    }

    /// Rebuild a version from its stored payload.
    ///
    /// Delta payloads need the same `base` they were computed against.
    /// When `base_checksum` is given, any other base is rejected before the
    /// delta is replayed.
    pub async fn decompress_version(
        &self,
        payload: &[u8],
        algorithm: Algorithm,
        delta_compression: bool,
        base: Option<&str>,
        base_checksum: Option<u32>,
    ) -> Result<String> {
        let decompressed = self.service.decompress(payload, algorithm).await;
        let text = match decompressed.data {
            Some(text) if decompressed.success => text,
            _ => {
                return Err(CompressError::Decompression(
                    decompressed
                        .error
                        .unwrap_or_else(|| "Decompression failed".to_string()),
                ))
            },
        };

        if !delta_compression {
            return Ok(text);
        }
        let base = base.ok_or_else(|| {
            CompressError::DeltaCorrupt("Delta payload needs its base version".to_string())
        })?;
        if let Some(expected) = base_checksum {
            verify_base(base, expected)?;
        }
        Delta::parse(&text)?.apply(base)
    }

    /// Rebuild a version from a [`VersionCompressionResult`]
    pub async fn restore(
        &self,
        version: &VersionCompressionResult,
        base: Option<&str>,
    ) -> Result<String> {
        self.decompress_version(
            &version.payload,
            version.result.algorithm,
            version.delta_compression,
            base,
            version.base_checksum,
        )
        .await
    }

    /// See [`validate_version_integrity`]
    pub fn validate_version_integrity(&self, original: &str, decompressed: &str) -> IntegrityReport {
        validate_version_integrity(original, decompressed)
    }

    /// See [`optimize_version_data`]
    pub fn optimize_version_data(&self, content: &str) -> String {
        optimize_version_data(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::NoMemoryProbe;

    fn service() -> VersionCompressionService {
        VersionCompressionService::new(Arc::new(
            CompressionService::default().with_memory_probe(Arc::new(NoMemoryProbe)),
        ))
    }

    fn document(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("{i:04} {:x} meeting notes line", i * 7919 % 65_521))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_small_edit_uses_delta() {
        let service = service();
        let base = document(400);
        let current = base.replacen("0200 ", "0200 edited ", 1) + "\nappended line";

        let version = service
            .compress_version(&current, Some(&base), &VersionCompressionOptions::default())
            .await;
        assert!(version.delta_compression);
        assert!(version.delta_size.unwrap() < current.len());
        assert_eq!(version.base_checksum, Some(checksum(&base)));

        let restored = service.restore(&version, Some(&base)).await.unwrap();
        assert_eq!(restored, current);
    }

    #[tokio::test]
    async fn test_three_line_edit_uses_delta() {
        let service = service();
        let base = "L1\nL2\nL3";
        let current = "L1\nL2-mod\nL3\nL4";

        let version = service
            .compress_version(current, Some(base), &VersionCompressionOptions::default())
            .await;
        assert!(version.delta_compression);
        assert!(version.delta_size.unwrap() < current.len());
        assert_eq!(service.restore(&version, Some(base)).await.unwrap(), current);

        let err = service.restore(&version, Some("L1\nL2\nL9")).await.unwrap_err();
        assert!(matches!(err, CompressError::DeltaBaseMismatch { .. }));
    }

    #[tokio::test]
    async fn test_decompress_without_checksum_still_checks_shape() {
        let service = service();
        let base = "L1\nL2\nL3";
        let version = service
            .compress_version("L1\nL2-mod\nL3\nL4", Some(base), &VersionCompressionOptions::default())
            .await;

        let err = service
            .decompress_version(&version.payload, version.result.algorithm, true, Some("L1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompressError::DeltaCorrupt(_)));
    }

    #[tokio::test]
    async fn test_wrong_base_fails_explicitly() {
        let service = service();
        let base = document(400);
        let current = format!("{base}\nnew tail");

        let version = service
            .compress_version(&current, Some(&base), &VersionCompressionOptions::default())
            .await;
        assert!(version.delta_compression);

        let wrong = base.replacen("0001", "9999", 1);
        let err = service.restore(&version, Some(&wrong)).await.unwrap_err();
        assert!(matches!(err, CompressError::DeltaBaseMismatch { .. }));

        let err = service.restore(&version, None).await.unwrap_err();
        assert!(matches!(err, CompressError::DeltaCorrupt(_)));
    }

    #[tokio::test]
    async fn test_no_base_stores_full_version() {
        let service = service();
        let current = document(100);

        let version = service
            .compress_version(&current, None, &VersionCompressionOptions::default())
            .await;
        assert!(!version.delta_compression);
        assert_eq!(version.delta_size, None);
        assert_eq!(service.restore(&version, None).await.unwrap(), current);
    }

    #[tokio::test]
    async fn test_delta_disabled_stores_full_version() {
        let service = service();
        let base = document(100);
        let options = VersionCompressionOptions {
            use_delta_compression: false,
            ..Default::default()
        };

        let version = service.compress_version(&base, Some(&base), &options).await;
        assert!(!version.delta_compression);
    }

    #[tokio::test]
    async fn test_unrelated_rewrite_stores_full_version() {
        let service = service();
        let base = "tiny";
        let current = "word ".repeat(400);

        let version = service
            .compress_version(&current, Some(base), &VersionCompressionOptions::default())
            .await;
        assert!(!version.delta_compression);
        assert_eq!(service.restore(&version, Some(base)).await.unwrap(), current);
    }

    #[test]
    fn test_integrity_report() {
        let report = validate_version_integrity("a\nb\nc", "a\nb\nc");
        assert!(report.is_valid);
        assert!((report.similarity - 1.0).abs() < f64::EPSILON);

        let report = validate_version_integrity("a\nb\nc\nd", "a\nX\nc\nd");
        assert!(!report.is_valid);
        assert!((report.similarity - 0.75).abs() < 1e-9);
        assert_eq!(report.differences.len(), 1);
        assert_eq!(report.differences[0].original_start, 1);
    }

    #[test]
    fn test_optimize_version_data() {
        let raw = "title  \r\n\r\n\r\n\r\nbody\t\rend";
        assert_eq!(optimize_version_data(raw), "title\n\nbody\nend");
    }
}
