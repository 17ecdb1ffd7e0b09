//! Compression algorithm types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompressError, Result};

/// Algorithm requested by a caller or recorded on a result.
///
/// `Auto` is a selection mode, never a codec: it resolves to whichever
/// [`CodecKind`] produced the smaller output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// General-purpose codec (deflate in a gzip container)
    #[default]
    Gzip,
    /// High-ratio codec
    Brotli,
    /// No compression (passthrough)
    None,
    /// Run both codecs, keep the smaller output
    Auto,
}

impl Algorithm {
    /// Lowercase name, as used in tags and persisted records
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Brotli => "brotli",
            Algorithm::None => "none",
            Algorithm::Auto => "auto",
        }
    }

    /// Concrete codec backing this algorithm, if it maps to exactly one
    pub fn codec(&self) -> Option<CodecKind> {
        match self {
            Algorithm::Gzip => Some(CodecKind::Gzip),
            Algorithm::Brotli => Some(CodecKind::Brotli),
            Algorithm::None | Algorithm::Auto => None,
        }
    }

    /// Get all algorithms
    pub fn all() -> &'static [Algorithm] {
        &[
            Algorithm::Gzip,
            Algorithm::Brotli,
            Algorithm::Auto,
            Algorithm::None,
        ]
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Algorithm {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Algorithm::Gzip),
            "brotli" | "br" => Ok(Algorithm::Brotli),
            "none" => Ok(Algorithm::None),
            "auto" => Ok(Algorithm::Auto),
            other => Err(CompressError::InvalidAlgorithm(other.to_string())),
        }
    }
}

/// A concrete stream codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// General-purpose codec
    Gzip,
    /// High-ratio codec
    Brotli,
}

impl CodecKind {
    /// Codecs in declaration order. `Auto` mode breaks ties in favor of
    /// the earlier entry.
    pub const ALL: [CodecKind; 2] = [CodecKind::Gzip, CodecKind::Brotli];

    /// Algorithm tag for results produced by this codec
    pub fn algorithm(self) -> Algorithm {
        match self {
            CodecKind::Gzip => Algorithm::Gzip,
            CodecKind::Brotli => Algorithm::Brotli,
        }
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        self.algorithm().name()
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("gzip".parse::<Algorithm>().unwrap(), Algorithm::Gzip);
        assert_eq!("BROTLI".parse::<Algorithm>().unwrap(), Algorithm::Brotli);
        assert_eq!(" auto ".parse::<Algorithm>().unwrap(), Algorithm::Auto);
        assert_eq!("none".parse::<Algorithm>().unwrap(), Algorithm::None);
        assert!("lz4".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_codec_mapping() {
        assert_eq!(Algorithm::Gzip.codec(), Some(CodecKind::Gzip));
        assert_eq!(Algorithm::Brotli.codec(), Some(CodecKind::Brotli));
        assert_eq!(Algorithm::Auto.codec(), None);
        assert_eq!(Algorithm::None.codec(), None);
        assert_eq!(CodecKind::Brotli.algorithm(), Algorithm::Brotli);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Algorithm::Brotli).unwrap();
        assert_eq!(json, "\"brotli\"");
        let parsed: Algorithm = serde_json::from_str("\"gzip\"").unwrap();
        assert_eq!(parsed, Algorithm::Gzip);
    }
}
