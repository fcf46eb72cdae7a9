use thiserror::Error;

/// Errors raised by a [`Tokenizer`](crate::Tokenizer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// Id outside the tokenizer's vocabulary.
    #[error("token id {id} is not in the {encoding} vocabulary")]
    UnknownId {
        /// Encoding name.
        encoding: String,
        /// Offending id.
        id: u32,
    },
    /// Detokenized bytes do not form valid UTF-8.
    #[error("{encoding} tokens do not decode to valid UTF-8")]
    InvalidUtf8 {
        /// Encoding name.
        encoding: String,
    },
}

/// Errors that can occur while encoding or decoding a token stream.
///
/// Token offsets count 32-bit tokens from the start of the payload, not bytes.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The buffer does not start with the `TENS` magic.
    #[error("bad magic: {found:?}, expected {expected:?}")]
    BadMagic {
        /// First four bytes of the buffer.
        found: [u8; 4],
        /// Expected magic.
        expected: [u8; 4],
    },
    /// The format version byte is not supported.
    #[error("unsupported format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version byte found.
        found: u8,
        /// Version this build reads.
        expected: u8,
    },
    /// The buffer ends before the declared content.
    #[error("truncated buffer at byte {offset}: {needed} more bytes needed")]
    Truncated {
        /// Byte offset where data ran out.
        offset: usize,
        /// Missing byte count.
        needed: usize,
    },
    /// The buffer holds bytes past the declared token count.
    #[error("{extra} trailing bytes after byte {offset}")]
    TrailingBytes {
        /// Byte offset of the first surplus byte.
        offset: usize,
        /// Surplus byte count.
        extra: usize,
    },
    /// The encoding name in the header is not valid.
    #[error("invalid encoding name: {0}")]
    InvalidEncodingName(String),
    /// The stream was produced for a different tokenizer.
    #[error("stream is encoded with {found}, decoder uses {expected}")]
    EncodingMismatch {
        /// Encoding the decoder was given.
        expected: String,
        /// Encoding named in the header.
        found: String,
    },
    /// No tokenizer is registered under the requested encoding name.
    #[error("unknown encoding {name}; known encodings: {known:?}")]
    UnknownEncoding {
        /// Requested encoding.
        name: String,
        /// Registered encodings.
        known: Vec<String>,
    },
    /// A reserved id that no band assigns.
    #[error("unassigned token {token} at offset {offset}")]
    InvalidToken {
        /// Token offset.
        offset: usize,
        /// Raw token value.
        token: u32,
    },
    /// A token that the grammar does not allow at this position.
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        /// Token offset.
        offset: usize,
        /// What the grammar expected.
        expected: &'static str,
        /// What was found.
        found: String,
    },
    /// Presence-mask chunks do not match the schema's field count.
    #[error("malformed presence mask at offset {offset}: {reason}")]
    MaskFraming {
        /// Token offset of the `PRESENCE_MASK` marker.
        offset: usize,
        /// Reason for invalidity.
        reason: String,
    },
    /// `SCHEMA_REF` names a schema that was never defined.
    #[error("unknown schema id {id} at offset {offset}")]
    UnknownSchemaRef {
        /// Token offset.
        offset: usize,
        /// Referenced schema id.
        id: u32,
    },
    /// A dictionary reference names an undefined entry.
    #[error("unknown dictionary id {id} at offset {offset}")]
    UnknownDictRef {
        /// Token offset.
        offset: usize,
        /// Referenced dictionary id.
        id: u32,
    },
    /// A literal (schema id, dictionary id, marked string) failed to parse.
    #[error("invalid {what} literal {text:?} at offset {offset}")]
    InvalidLiteral {
        /// Token offset.
        offset: usize,
        /// What the literal should hold.
        what: &'static str,
        /// Detokenized text.
        text: String,
    },
    /// Arrays and inline objects are nested deeper than the codec allows.
    #[error("nesting deeper than {max} levels at offset {offset}")]
    NestingTooDeep {
        /// Token offset where the limit was hit.
        offset: usize,
        /// Maximum nesting depth.
        max: usize,
    },
    /// The tokenizer produced an id that collides with the reserved bands.
    #[error("{encoding} produced id {id}, vocabulary limit is {limit}")]
    VocabularyOverflow {
        /// Encoding name.
        encoding: String,
        /// Offending id.
        id: u32,
        /// Exclusive upper bound for vocabulary ids.
        limit: u32,
    },
    /// An array is too long for the array-length band.
    #[error("array of {len} elements exceeds maximum {max}")]
    ArrayTooLong {
        /// Actual length.
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },
    /// A top-level row is not an object.
    #[error("row {index} is not an object")]
    RowNotObject {
        /// Row index.
        index: usize,
    },
    /// The token count does not fit the header.
    #[error("stream of {0} tokens exceeds the header limit")]
    StreamTooLong(usize),
    /// Tokenizer failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
}
