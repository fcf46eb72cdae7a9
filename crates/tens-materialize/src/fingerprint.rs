//! Tokenizer fingerprints for drift detection.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tens_codec::Tokenizer;

/// Format tag hashed ahead of the sample ids.
const FINGERPRINT_TAG: &[u8] = b"tens-fingerprint-v1\0";

/// Fixed sample text covering ASCII, punctuation, numbers, whitespace and
/// several scripts.
pub const FINGERPRINT_SAMPLE: &str = "The quick brown fox jumps over the lazy dog. \
0123456789 -3.25e-7 {\"k\": [1, null, true]} @0 _ \"quoted\"\n\t\
Ünïcödé façade naïve Straße café 日本語のテキスト 中文 한국어 Русский текст \
العربية עברית हिन्दी ไทย 🚀✨ ＡＢＣ ﬁ";

/// SHA-256 hex of the format tag and the sample's token ids.
pub fn fingerprint(tokenizer: &dyn Tokenizer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_TAG);
    for id in tokenizer.tokenize(FINGERPRINT_SAMPLE) {
        hasher.update(id.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Outcome of comparing a fresh fingerprint with the remembered one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintCheck {
    /// First fingerprint seen for the encoding.
    First,
    /// Same as before.
    Unchanged,
    /// The tokenizer changed behaviour.
    Drifted {
        /// Fingerprint remembered before this check.
        previous: String,
    },
}

/// Last fingerprint seen per encoding name.
#[derive(Debug, Clone, Default)]
pub struct FingerprintCache {
    known: HashMap<String, String>,
}

impl FingerprintCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` for `encoding` and reports how it compares.
    pub fn check(&mut self, encoding: &str, current: &str) -> FingerprintCheck {
        match self.known.insert(encoding.to_string(), current.to_string()) {
            None => FingerprintCheck::First,
            Some(previous) if previous == current => FingerprintCheck::Unchanged,
            Some(previous) => FingerprintCheck::Drifted { previous },
        }
    }

    /// Remembered fingerprint for `encoding`.
    pub fn get(&self, encoding: &str) -> Option<&str> {
        self.known.get(encoding).map(String::as_str)
    }
}
