//! Compression core error types.
//!
//! # Propagation Policy
//!
//! Errors split along the data-loss line:
//!
//! - **Recovered locally**: codec faults (unsupported algorithm, corrupt
//!   stream, timeout) are folded into failed `CompressionResult` /
//!   `DecompressionResult` values by the Compression Service. They reach
//!   callers as `success == false`, never as `Err`.
//! - **Propagated**: storage, serialization and delta-integrity faults are
//!   returned as `Err` because swallowing them could lose or corrupt data.

use thiserror::Error;

/// Compression core errors.
#[derive(Error, Debug)]
pub enum CompressError {
    /// Compression operation failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression operation failed.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The host has no implementation of the requested codec.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Algorithm name could not be parsed.
    #[error("Invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Delta payload was produced against a different base version.
    ///
    /// Replaying a delta on the wrong base silently corrupts content, so
    /// this is always fatal to the calling operation.
    #[error("Delta base mismatch: expected checksum {expected:08x}, got {actual:08x}")]
    DeltaBaseMismatch {
        /// Checksum recorded in the delta payload.
        expected: u32,
        /// Checksum of the base supplied by the caller.
        actual: u32,
    },

    /// Delta payload is malformed or does not fit its base.
    #[error("Corrupt delta: {0}")]
    DeltaCorrupt(String),

    /// Durable store failure (open, query, transaction).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Value could not be serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Codec call exceeded its deadline.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for compression core operations
pub type Result<T> = std::result::Result<T, CompressError>;

impl From<rusqlite::Error> for CompressError {
    fn from(err: rusqlite::Error) -> Self {
        CompressError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for CompressError {
    fn from(err: toml::de::Error) -> Self {
        CompressError::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for CompressError {
    fn from(err: base64::DecodeError) -> Self {
        CompressError::Decompression(format!("Base64 decode error: {err}"))
    }
}

impl From<tokio::task::JoinError> for CompressError {
    fn from(err: tokio::task::JoinError) -> Self {
        CompressError::Compression(format!("Codec task failed: {err}"))
    }
}
