//! Error types for store operations.

use tens_canonical::ValidationError;
use tens_codec::CodecError;
use tens_materialize::MaterializeError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Metadata could not be serialized or parsed.
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
    /// No entry is stored under the hash.
    #[error("no stored entry for {hash}")]
    NotFound {
        /// Requested hash.
        hash: String,
    },
    /// A stored entry does not match its hash or metadata.
    #[error("stored entry {hash} is corrupt: {reason}")]
    Corrupt {
        /// Hash of the entry.
        hash: String,
        /// What failed to verify.
        reason: String,
    },
    /// The hash is not 64 lowercase hex characters.
    #[error("invalid hash: {0}")]
    InvalidHash(#[from] ValidationError),
    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Materialization error.
    #[error("materialize error: {0}")]
    Materialize(#[from] MaterializeError),
}
