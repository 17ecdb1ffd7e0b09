//! Brotli compression codec (CodecKind::Brotli).
//!
//! The high-ratio codec. Slower than gzip but wins on larger markup-heavy
//! payloads such as HTML and rich-text notes.

use brotli::{CompressorWriter, Decompressor};
use std::io::{Read, Write};

use super::{Codec, CodecKind};
use crate::error::{CompressError, Result};

/// Window size for Brotli (larger = better compression for large files)
const DEFAULT_WINDOW_SIZE: u32 = 22;

/// Internal buffer size for the stream transforms
const BUFFER_SIZE: usize = 4096;

/// Brotli codec
#[derive(Debug, Clone)]
pub struct BrotliCodec {
    /// Window size (10-24)
    pub window_size: u32,
}

impl Default for BrotliCodec {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl BrotliCodec {
    /// Create new Brotli codec with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a 1-9 level onto Brotli's 0-11 quality scale.
    ///
    /// Level 9 reaches quality 11 so "maximum level" means maximum effort
    /// for both codecs.
    pub fn quality_for_level(level: u32) -> u32 {
        let level = level.clamp(1, 9);
        (level * 11 + 8) / 9
    }
}

impl Codec for BrotliCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Brotli
    }

    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        let mut compressed = Vec::new();
        {
            let mut writer = CompressorWriter::new(
                &mut compressed,
                BUFFER_SIZE,
                Self::quality_for_level(level),
                self.window_size,
            );
            writer
                .write_all(data)
                .map_err(|e| CompressError::Compression(e.to_string()))?;
        }
        Ok(compressed)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressor = Decompressor::new(data, BUFFER_SIZE);
        let mut decompressed = Vec::new();
        decompressor
            .read_to_end(&mut decompressed)
            .map_err(|e| CompressError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let codec = BrotliCodec::new();
        let original = b"Hello, Brotli! This is a test of byte compression.";

        let compressed = codec.encode(original, 6).unwrap();
        let decompressed = codec.decode(&compressed).unwrap();

        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_repetitive_content_shrinks() {
        let codec = BrotliCodec::new();
        let original = "<p>The quick brown fox jumps over the lazy dog.</p>".repeat(40);

        let compressed = codec.encode(original.as_bytes(), 9).unwrap();
        assert!(compressed.len() < original.len() / 4);
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(BrotliCodec::quality_for_level(1), 2);
        assert_eq!(BrotliCodec::quality_for_level(9), 11);
        assert_eq!(BrotliCodec::quality_for_level(42), 11);
        assert_eq!(BrotliCodec::quality_for_level(0), 2);
    }
}
