//! Content version identifiers.
//!
//! A manifest body is a 128-bit content hash written as 32 hex characters.
//! The all-zero hash stands for "never loaded".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bytes in a version hash
pub const VERSION_HASH_LEN: usize = 16;

/// Errors produced when parsing a version hash
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("Version hash must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Version hash is not valid hex: {0}")]
    InvalidHex(String),
}

/// 128-bit payload revision identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionHash([u8; VERSION_HASH_LEN]);

impl VersionHash {
    /// The "never loaded" version
    pub const ZERO: VersionHash = VersionHash([0; VERSION_HASH_LEN]);

    pub fn from_bytes(bytes: [u8; VERSION_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; VERSION_HASH_LEN]
    }

    /// Parse a manifest body. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let text = text.trim();
        let expected = VERSION_HASH_LEN * 2;
        if text.len() != expected {
            return Err(VersionParseError::InvalidLength {
                expected,
                actual: text.len(),
            });
        }

        let mut bytes = [0u8; VERSION_HASH_LEN];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| VersionParseError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Restore a persisted value. Empty strings and the legacy `"0"`
    /// marker map to [`VersionHash::ZERO`], as does anything unparseable.
    pub fn from_persisted(text: &str) -> Self {
        match text.trim() {
            "" | "0" => Self::ZERO,
            other => Self::parse(other).unwrap_or(Self::ZERO),
        }
    }

    /// Value written to persistent storage
    pub fn to_persisted(&self) -> String {
        if self.is_zero() {
            "0".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for VersionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for VersionHash {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
