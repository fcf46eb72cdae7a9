//! Tokenizer contract and registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{CodecError, TokenizerError};

/// Encoding name of the built-in [`ByteTokenizer`].
pub const BYTE_ENCODING: &str = "bytes";

/// A sub-word tokenizer the codec writes literals with.
///
/// Implementations must be deterministic: the same text always yields the
/// same ids, and `detokenize(tokenize(s)) == s`.
pub trait Tokenizer: Send + Sync {
    /// Stable encoding name, recorded in stream headers.
    fn encoding_name(&self) -> &str;

    /// Exclusive upper bound of the ids this tokenizer emits.
    fn vocab_size(&self) -> u32;

    /// Splits `text` into vocabulary ids.
    fn tokenize(&self, text: &str) -> Vec<u32>;

    /// Joins vocabulary ids back into text.
    fn detokenize(&self, ids: &[u32]) -> Result<String, TokenizerError>;
}

/// Tokenizer that maps every UTF-8 byte to its own id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encoding_name(&self) -> &str {
        BYTE_ENCODING
    }

    fn vocab_size(&self) -> u32 {
        256
    }

    fn tokenize(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn detokenize(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let bytes = ids
            .iter()
            .map(|&id| {
                u8::try_from(id).map_err(|_| TokenizerError::UnknownId {
                    encoding: BYTE_ENCODING.to_string(),
                    id,
                })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        String::from_utf8(bytes).map_err(|_| TokenizerError::InvalidUtf8 {
            encoding: BYTE_ENCODING.to_string(),
        })
    }
}

/// Tokenizers by encoding name.
#[derive(Clone)]
pub struct TokenizerRegistry {
    tokenizers: BTreeMap<String, Arc<dyn Tokenizer>>,
}

impl TokenizerRegistry {
    /// Creates a registry with no tokenizers.
    pub fn empty() -> Self {
        Self {
            tokenizers: BTreeMap::new(),
        }
    }

    /// Registers `tokenizer` under its encoding name, returning the one it replaces.
    pub fn register(&mut self, tokenizer: Arc<dyn Tokenizer>) -> Option<Arc<dyn Tokenizer>> {
        self.tokenizers
            .insert(tokenizer.encoding_name().to_string(), tokenizer)
    }

    /// Looks up a tokenizer.
    pub fn get(&self, encoding_name: &str) -> Option<Arc<dyn Tokenizer>> {
        self.tokenizers.get(encoding_name).cloned()
    }

    /// Looks up a tokenizer, failing with the list of known encodings.
    pub fn require(&self, encoding_name: &str) -> Result<Arc<dyn Tokenizer>, CodecError> {
        self.get(encoding_name)
            .ok_or_else(|| CodecError::UnknownEncoding {
                name: encoding_name.to_string(),
                known: self.names(),
            })
    }

    /// Registered encoding names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tokenizers.keys().cloned().collect()
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ByteTokenizer));
        registry
    }
}

impl fmt::Debug for TokenizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerRegistry")
            .field("encodings", &self.names())
            .finish()
    }
}
