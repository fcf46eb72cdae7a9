use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

const HASH_PATTERN: &str = r"^[0-9a-f]{64}$";

/// SHA-256 digest of canonical encoded bytes, as 64 lowercase hex characters.
///
/// This is the identity of a dataset: equal hashes imply bit-identical
/// encodings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Parses a validated hash from a string.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let re = Regex::new(HASH_PATTERN).expect("invalid regex");
        if !re.is_match(&s) {
            return Err(ValidationError::PatternMismatch {
                field: "content_hash",
                value: s,
                pattern: HASH_PATTERN,
            });
        }
        Ok(Self(s))
    }

    /// Returns the hex string.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Computes the content hash of canonical bytes as a hex string.
pub fn hash(bytes: &[u8]) -> String {
    ContentHash::of(bytes).0
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}
