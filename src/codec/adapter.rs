//! Uniform async front for the available codecs.
//!
//! Codec work is CPU-bound and synchronous, so the adapter moves it onto
//! tokio's blocking pool. Callers suspend while bytes move through the
//! codec and never stall the scheduler.

use std::sync::Arc;

use super::brotli::BrotliCodec;
use super::gzip::GzipCodec;
use super::{Codec, CodecKind};
use crate::error::{CompressError, Result};

/// Codec adapter with a host-specific set of codecs
#[derive(Clone)]
pub struct CodecAdapter {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Default for CodecAdapter {
    fn default() -> Self {
        Self {
            codecs: vec![Arc::new(GzipCodec::new()), Arc::new(BrotliCodec::new())],
        }
    }
}

impl std::fmt::Debug for CodecAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecAdapter")
            .field("codecs", &self.available())
            .finish()
    }
}

impl CodecAdapter {
    /// Create adapter with every built-in codec
    pub fn new() -> Self {
        Self::default()
    }

    /// Create adapter from an explicit codec set
    pub fn with_codecs(codecs: Vec<Arc<dyn Codec>>) -> Self {
        Self { codecs }
    }

    /// Drop a codec, modelling a host that does not implement it
    pub fn without(mut self, kind: CodecKind) -> Self {
        self.codecs.retain(|c| c.kind() != kind);
        self
    }

    /// Check if a codec is available on this host
    pub fn supports(&self, kind: CodecKind) -> bool {
        self.codecs.iter().any(|c| c.kind() == kind)
    }

    /// Codecs available on this host, in registration order
    pub fn available(&self) -> Vec<CodecKind> {
        self.codecs.iter().map(|c| c.kind()).collect()
    }

    fn codec(&self, kind: CodecKind) -> Result<Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.kind() == kind)
            .cloned()
            .ok_or_else(|| CompressError::UnsupportedAlgorithm(kind.name().to_string()))
    }

    /// Encode on the current thread
    pub fn encode_blocking(&self, data: &[u8], kind: CodecKind, level: u32) -> Result<Vec<u8>> {
        self.codec(kind)?.encode(data, level)
    }

    /// Decode on the current thread
    pub fn decode_blocking(&self, data: &[u8], kind: CodecKind) -> Result<Vec<u8>> {
        self.codec(kind)?.decode(data)
    }

    /// Encode bytes with the given codec
    pub async fn encode(&self, data: Arc<[u8]>, kind: CodecKind, level: u32) -> Result<Vec<u8>> {
        let codec = self.codec(kind)?;
        tokio::task::spawn_blocking(move || codec.encode(&data, level)).await?
    }

    /// Decode bytes with the given codec
    pub async fn decode(&self, data: Arc<[u8]>, kind: CodecKind) -> Result<Vec<u8>> {
        let codec = self.codec(kind)?;
        tokio::task::spawn_blocking(move || codec.decode(&data)).await?
    }
}
