//! Token-stream codec for canonical TENS datasets.
//!
//! Rows are canonicalized, flattened to dot paths, and written as a stream
//! of 32-bit ids. Ids below [`CTRL_BASE`] are tokenizer vocabulary; reserved
//! bands above it carry structure (schemas, dictionary, presence masks,
//! arrays). The framed stream is hashed to give the dataset its identity.
//!
//! ## Quick Start
//!
//! ```rust
//! use tens_codec::Codec;
//! use serde_json::json;
//!
//! let codec = Codec::default();
//! let ir = codec.encode_json(&[json!({"id": 1, "name": "Test"})], "bytes")?;
//! let decoded = codec.decode(&ir.bytes)?;
//! assert_eq!(decoded.rows, ir.canonical_data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Stream grammar
//!
//! ```text
//! stream  := dict* schema* row*
//! dict    := DICT_DEF id-literal SEP value-literal SEP
//! schema  := SCHEMA_DEF (TYPE_TAG field-literal SEP)*
//! row     := (positional | masked | referenced) ROW_BREAK
//! masked  := PRESENCE_MASK MASK_CHUNK{ceil(n/16)} (value SEP)*
//! referenced := SCHEMA_REF id-literal OBJ_START (value SEP)* OBJ_END
//! value   := NULL_VAL | BOOL_TRUE | BOOL_FALSE | DICT_REF | literal
//!          | STRING_LIT literal
//!          | FIXED_ARRAY ARRAY_LEN (value (SEP value)*)?
//!          | OBJ_START (key-literal SEP value SEP)* OBJ_END
//! ```
//!
//! An unmarked literal is a number when its text is canonical number text
//! and a string otherwise. Strings that read as numbers carry `STRING_LIT`.
//! Arrays and inline objects nest at most [`MAX_NESTING_DEPTH`] levels.

#![deny(missing_docs)]

/// Reserved id bands and token classification.
pub mod bands;
/// Token-stream decoder.
pub mod decoder;
/// Value dictionary.
pub mod dictionary;
/// Token-stream encoder.
pub mod encoder;
/// Error types.
pub mod errors;
/// Dot-path flattening.
pub mod flatten;
/// Stream header framing.
pub mod frame;
/// Encode pipeline and codec front end.
pub mod ir;
/// Schema registry.
pub mod schema;
/// Tokenizer contract.
pub mod tokenizer;

pub use bands::{
    Opcode, Token, ARRAY_LEN_BASE, CTRL_BASE, DICT_REF_BASE, MASK_CHUNK_BASE, MAX_NESTING_DEPTH,
};
pub use decoder::{DecodedStream, Decoder};
pub use dictionary::Dictionary;
pub use encoder::{BatchPlan, EncodeStats, EncodedStream, Encoder, EncoderOptions, Framing};
pub use errors::{CodecError, TokenizerError};
pub use flatten::{flatten, unflatten, FlatRow};
pub use frame::{read_frame, write_frame, FrameHeader, FORMAT_VERSION, MAGIC};
pub use ir::{Codec, EncodedIr, IR_VERSION};
pub use schema::{FieldType, Schema, SchemaRegistry};
pub use tokenizer::{ByteTokenizer, Tokenizer, TokenizerRegistry, BYTE_ENCODING};
