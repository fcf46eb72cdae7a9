//! Canonicalize, encode and hash in one step.

use serde_json::Value;
use tens_canonical::{
    CanonicalValue, Canonicalizer, ContentHash, HygieneReport, RawValue,
    CANONICALIZATION_VERSION,
};
use tracing::debug;

use crate::decoder::{DecodedStream, Decoder};
use crate::encoder::{Encoder, EncoderOptions};
use crate::errors::CodecError;
use crate::frame::{write_frame, FrameHeader, FORMAT_VERSION};
use crate::schema::Schema;
use crate::tokenizer::{TokenizerRegistry, BYTE_ENCODING};

/// Version of the encoded representation.
pub const IR_VERSION: u8 = FORMAT_VERSION;

/// A canonical dataset in its encoded form.
///
/// `hash` is the SHA-256 of `bytes`; equal hashes mean identical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedIr {
    /// Framed token stream.
    pub bytes: Vec<u8>,
    /// Schemas, in id order.
    pub schemas: Vec<Schema>,
    /// Content hash of `bytes`.
    pub hash: ContentHash,
    /// Canonical rows the bytes were produced from.
    pub canonical_data: Vec<CanonicalValue>,
    /// Format version of `bytes`.
    pub ir_version: u8,
    /// Canonicalization version of `canonical_data`.
    pub canonicalization_version: u32,
    /// Tokenizer encoding of the vocabulary ids in `bytes`.
    pub encoding_name: String,
    /// Number of rows.
    pub row_count: usize,
}

impl EncodedIr {
    /// Size of `bytes`.
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Encoder and decoder front end over a tokenizer registry.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    tokenizers: TokenizerRegistry,
    options: EncoderOptions,
}

impl Codec {
    /// Creates a codec.
    pub fn new(tokenizers: TokenizerRegistry, options: EncoderOptions) -> Self {
        Self {
            tokenizers,
            options,
        }
    }

    /// Registered tokenizers.
    pub fn tokenizers(&self) -> &TokenizerRegistry {
        &self.tokenizers
    }

    /// Encoder options.
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Canonicalizes and encodes rows with the built-in byte tokenizer.
    pub fn encode(&self, rows: &[RawValue]) -> Result<EncodedIr, CodecError> {
        self.encode_with(rows, BYTE_ENCODING)
    }

    /// Canonicalizes and encodes rows with the named encoding.
    pub fn encode_with(&self, rows: &[RawValue], encoding_name: &str) -> Result<EncodedIr, CodecError> {
        self.encode_with_report(rows, encoding_name).map(|(ir, _)| ir)
    }

    /// Like [`Codec::encode_with`], also returning the canonicalization report.
    pub fn encode_with_report(
        &self,
        rows: &[RawValue],
        encoding_name: &str,
    ) -> Result<(EncodedIr, HygieneReport), CodecError> {
        let result = Canonicalizer::new().canonicalize(rows);
        let ir = self.encode_canonical(result.rows, encoding_name)?;
        Ok((ir, result.report))
    }

    /// Canonicalizes and encodes JSON rows.
    pub fn encode_json(&self, rows: &[Value], encoding_name: &str) -> Result<EncodedIr, CodecError> {
        let raw: Vec<RawValue> = rows.iter().map(RawValue::from).collect();
        self.encode_with(&raw, encoding_name)
    }

    /// Encodes rows that are already canonical.
    pub fn encode_canonical(
        &self,
        rows: Vec<CanonicalValue>,
        encoding_name: &str,
    ) -> Result<EncodedIr, CodecError> {
        let tokenizer = self.tokenizers.require(encoding_name)?;
        let stream = Encoder::new(tokenizer.as_ref(), self.options.clone()).encode(&rows)?;
        let bytes = write_frame(encoding_name, &stream.tokens)?;
        let hash = ContentHash::of(&bytes);
        debug!(hash = %hash, bytes = bytes.len(), "encoded dataset");

        Ok(EncodedIr {
            hash,
            schemas: stream.schemas,
            row_count: rows.len(),
            canonical_data: rows,
            ir_version: IR_VERSION,
            canonicalization_version: CANONICALIZATION_VERSION,
            encoding_name: encoding_name.to_string(),
            bytes,
        })
    }

    /// Decodes a framed buffer with the tokenizer its header names.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedStream, CodecError> {
        let (header, _) = FrameHeader::from_bytes(bytes)?;
        let tokenizer = self.tokenizers.require(&header.encoding_name)?;
        Decoder::new(tokenizer.as_ref()).decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_over_encoded_bytes() {
        let ir = Codec::default()
            .encode_json(&[json!({"a": 1})], "bytes")
            .unwrap();
        assert_eq!(ir.hash, ContentHash::of(&ir.bytes));
        assert_eq!(ir.row_count, 1);
        assert_eq!(ir.ir_version, 3);
        assert_eq!(ir.encoding_name, "bytes");
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let result = Codec::default().encode_json(&[json!({"a": 1})], "o200k");
        assert!(matches!(result, Err(CodecError::UnknownEncoding { .. })));
    }

    #[test]
    fn report_is_returned_with_the_ir() {
        let rows = vec![RawValue::object(vec![("x", RawValue::Float(f64::NAN))])];
        let (ir, report) = Codec::default().encode_with_report(&rows, "bytes").unwrap();
        assert_eq!(report.count("NonFiniteNumber"), 1);
        assert!(ir.canonical_data[0].as_object().unwrap()["x"].is_null());
    }
}
