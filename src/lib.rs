//! # notecomp - Compression core for note content
//!
//! Decides whether to compress text payloads (note bodies, serialized
//! storage records, version snapshots), picks a codec, caches results by
//! content fingerprint, tracks rolling statistics and raises threshold
//! alerts.
//!
//! ## Architecture
//!
//! ```text
//!   caller
//!     │
//!     ├──> ContentCompressionService ──┐
//!     ├──> VersionCompressionService ──┤
//!     ├──> LocalStorageCompression ────┤
//!     │      Service (+ DurableStore)  │
//!     │                                v
//!     └──────────────────────> CompressionService ──> CodecAdapter ──> gzip | brotli
//!                                (config, cache,
//!                                 stats)
//!
//!   CompressionMonitor <── events (CompressionResult / DecompressionResult)
//!     └── reads CompressionService stats for exports
//! ```
//!
//! ## Algorithms
//!
//! | Algorithm | Codec               | Notes                                   |
//! |-----------|---------------------|-----------------------------------------|
//! | `gzip`    | flate2 (deflate)    | Default, general purpose                |
//! | `brotli`  | brotli              | Higher ratio on markup                  |
//! | `auto`    | both                | Keeps the smaller output, ties to gzip  |
//! | `none`    | passthrough         | Also reported for skips and failures    |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use notecomp::{CompressionOptions, CompressionService};
//!
//! let service = CompressionService::default();
//! let note = "Remember the milk. ".repeat(100);
//!
//! let result = service.compress(&note, &CompressionOptions::new()).await;
//! assert!(result.success && result.ratio < 1.0);
//!
//! let bytes = result.compressed_data.unwrap();
//! let back = service.decompress(&bytes, result.algorithm).await;
//! assert_eq!(back.data.as_deref(), Some(note.as_str()));
//! ```
//!
//! ## Error Handling
//!
//! `compress` / `decompress` never return `Err`: codec faults come back as
//! results with `success == false`. Storage, serialization and delta
//! integrity faults are returned as [`CompressError`].

pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod monitor;
pub mod service;
pub mod storage;
pub mod version;

// Re-exports for convenience
pub use codec::{Algorithm, CodecAdapter, CodecKind};
pub use config::{CompressionConfig, CompressionConfigUpdate, Config, MonitorConfig, StorageConfig};
pub use content::{
    detect_content_type, ContentCompressionOptions, ContentCompressionResult,
    ContentCompressionService, ContentType,
};
pub use error::{CompressError, Result};
pub use monitor::{
    AlertSeverity, AlertType, CompressionAlert, CompressionEvent, CompressionMonitor, EventType,
    HealthCheckHandle, PerformanceMetrics,
};
pub use service::{
    CompressionOptions, CompressionResult, CompressionService, CompressionStats,
    DecompressionResult, ServiceMetrics,
};
pub use storage::{
    DurableStore, LocalStorageCompressionOptions, LocalStorageCompressionService,
    LocalStorageItem, MemoryStore, SqliteStore,
};
pub use version::{
    IntegrityReport, VersionCompressionOptions, VersionCompressionResult,
    VersionCompressionService,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
