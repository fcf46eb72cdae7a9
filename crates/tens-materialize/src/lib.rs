//! Tokenizer-specific materialization of encoded TENS datasets.
//!
//! A [`Materializer`] resolves a target profile to a tokenizer, renders the
//! dataset through a [`TextFormatter`], tokenizes the text and caches the
//! result per `(content hash, profile)`. Each call re-fingerprints the
//! tokenizer; a changed fingerprint invalidates that encoding's cache.
//!
//! ```rust
//! use tens_codec::{Codec, TokenizerRegistry};
//! use tens_materialize::{MaterializeOptions, Materializer, MaterializerConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let ir = Codec::default().encode_json(&[json!({"id": 1})], "bytes")?;
//! let mut materializer =
//!     Materializer::new(MaterializerConfig::default(), TokenizerRegistry::default())?;
//! let first = materializer.materialize(&ir, "bytes", &MaterializeOptions::default())?;
//! let again = materializer.materialize(&ir, "bytes", &MaterializeOptions::default())?;
//! assert!(Arc::ptr_eq(&first, &again));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Bounded result cache.
pub mod cache;
/// Error types.
pub mod errors;
/// Tokenizer fingerprints.
pub mod fingerprint;
/// Materializer.
pub mod materializer;
/// Target profiles.
pub mod profile;
/// Text formatters.
pub mod text;

pub use cache::{CacheKey, MaterializationCache};
pub use errors::MaterializeError;
pub use fingerprint::{fingerprint, FingerprintCache, FingerprintCheck, FINGERPRINT_SAMPLE};
pub use materializer::{
    MaterializeOptions, MaterializedResult, Materializer, MaterializerConfig, MaterializerStats,
    ProfileBinding, MATERIALIZE_CODEC_VERSION,
};
pub use profile::{ProfileId, ProfileTable};
pub use text::{TensTextFormatter, TextFormatter};
