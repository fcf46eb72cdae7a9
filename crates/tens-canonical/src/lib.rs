//! Canonical value model, canonicalizer and content hashing for TENS.
//!
//! Semantically identical inputs (any key order, `undefined` versus absent
//! keys, `-0` versus `0`, compatibility-equivalent Unicode) canonicalize to
//! identical [`CanonicalValue`] trees. Everything downstream that must be
//! byte-deterministic starts from this crate.

#![deny(missing_docs)]

/// Canonicalization of raw rows.
pub mod canonicalizer;
/// Content hashing of canonical bytes.
pub mod digest;
/// Hygiene report types emitted during canonicalization.
pub mod hygiene;
/// Validation helpers used by canonical types.
pub mod validation;
/// Raw and canonical value trees.
pub mod value;

pub use canonicalizer::{
    canonicalize, canonicalize_value, normalize_string, CanonicalizationResult, Canonicalizer,
    CANONICALIZATION_VERSION,
};
pub use digest::{hash, ContentHash};
pub use hygiene::{HygieneReport, HygieneStatus, HygieneWarning};
pub use validation::ValidationError;
pub use value::{CanonicalValue, Number, RawValue};
