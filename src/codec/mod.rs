//! Stream codecs behind a uniform interface.
//!
//! # Codecs
//!
//! | Codec        | Crate    | Best For                              |
//! |--------------|----------|---------------------------------------|
//! | [`Gzip`]     | flate2   | Plain text, JSON, markdown            |
//! | [`Brotli`]   | brotli   | HTML and rich-text (markup-heavy)     |
//!
//! [`Algorithm`] is what callers ask for (it adds `None` and `Auto`);
//! [`CodecKind`] is what actually runs. Every codec implements [`Codec`],
//! and [`CodecAdapter`] exposes the available set asynchronously.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notecomp::codec::{CodecAdapter, CodecKind};
//!
//! let adapter = CodecAdapter::new();
//! let bytes: Arc<[u8]> = Arc::from(&b"hello hello hello"[..]);
//! let packed = adapter.encode(bytes, CodecKind::Brotli, 6).await?;
//! let unpacked = adapter.decode(Arc::from(packed), CodecKind::Brotli).await?;
//! ```
//!
//! [`Gzip`]: CodecKind::Gzip
//! [`Brotli`]: CodecKind::Brotli

mod adapter;
mod algorithm;
mod brotli;
mod gzip;

pub use adapter::CodecAdapter;
pub use algorithm::{Algorithm, CodecKind};
pub use brotli::BrotliCodec;
pub use gzip::GzipCodec;

use crate::error::Result;

/// A byte-level compression codec.
///
/// Implementations are synchronous; [`CodecAdapter`] handles moving the
/// work off the async scheduler.
pub trait Codec: Send + Sync {
    /// Which codec this is
    fn kind(&self) -> CodecKind;

    /// Compress `data` at `level` (1-9, clamped)
    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>>;

    /// Decompress `data`
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}
