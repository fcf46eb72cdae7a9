//! Metadata records written next to stored bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tens_canonical::{CanonicalValue, ContentHash};
use tens_codec::{EncodedIr, Schema};

/// `meta.json` of a stored dataset.
///
/// Holds everything besides the bytes needed to rebuild the [`EncodedIr`],
/// including the canonical rows the materializer renders from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrMeta {
    /// Content hash of `ir.bin`.
    pub hash: ContentHash,
    /// Schemas, in id order.
    pub schemas: Vec<Schema>,
    /// Number of rows.
    pub row_count: usize,
    /// Size of `ir.bin`.
    pub byte_size: usize,
    /// When the entry was first stored.
    pub created_at: DateTime<Utc>,
    /// Format version of `ir.bin`.
    pub ir_version: u8,
    /// Canonicalization version of the rows.
    pub canonicalization_version: u32,
    /// Tokenizer encoding of the vocabulary ids in `ir.bin`.
    pub encoding_name: String,
    /// Canonical rows.
    pub canonical_data: Vec<CanonicalValue>,
}

impl IrMeta {
    /// Metadata for `ir`, stamped now.
    pub fn for_ir(ir: &EncodedIr) -> Self {
        Self {
            hash: ir.hash.clone(),
            schemas: ir.schemas.clone(),
            row_count: ir.row_count,
            byte_size: ir.byte_size(),
            created_at: Utc::now(),
            ir_version: ir.ir_version,
            canonicalization_version: ir.canonicalization_version,
            encoding_name: ir.encoding_name.clone(),
            canonical_data: ir.canonical_data.clone(),
        }
    }

    /// Rebuilds the encoded dataset around `bytes`.
    pub fn into_ir(self, bytes: Vec<u8>) -> EncodedIr {
        EncodedIr {
            bytes,
            schemas: self.schemas,
            hash: self.hash,
            canonical_data: self.canonical_data,
            ir_version: self.ir_version,
            canonicalization_version: self.canonicalization_version,
            encoding_name: self.encoding_name,
            row_count: self.row_count,
        }
    }
}

/// Listing entry for a stored dataset. Read from the same `meta.json` as
/// [`IrMeta`], skipping the rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSummary {
    /// Content hash.
    pub hash: ContentHash,
    /// Number of rows.
    pub row_count: usize,
    /// Size of `ir.bin`.
    pub byte_size: usize,
    /// When the entry was first stored.
    pub created_at: DateTime<Utc>,
    /// Format version.
    pub ir_version: u8,
    /// Tokenizer encoding.
    pub encoding_name: String,
}

/// `meta.json` of a cached materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Dataset the ids were produced from.
    pub source_hash: ContentHash,
    /// Target profile.
    pub target_profile: String,
    /// Encoding the profile resolved to.
    pub encoding_name: String,
    /// Text rendering version.
    pub codec_version: String,
    /// Number of ids in `tokens.bin`.
    pub token_count: usize,
    /// Tokenizer fingerprint when the ids were produced.
    pub fingerprint: String,
    /// When the ids were written.
    pub created_at: DateTime<Utc>,
}
