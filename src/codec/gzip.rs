//! Gzip compression codec (CodecKind::Gzip).
//!
//! The general-purpose codec: fast, universally available, decent ratio on
//! plain text and JSON.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::{Codec, CodecKind};
use crate::error::{CompressError, Result};

/// Gzip codec
#[derive(Debug, Clone, Default)]
pub struct GzipCodec;

impl GzipCodec {
    /// Create new gzip codec
    pub fn new() -> Self {
        Self
    }
}

impl Codec for GzipCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Gzip
    }

    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
        encoder
            .write_all(data)
            .map_err(|e| CompressError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CompressError::Compression(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CompressError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}
