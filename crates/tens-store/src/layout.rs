//! Directory layout of a store root.
//!
//! ```text
//! <root>/ir/<hash>/ir.bin
//! <root>/ir/<hash>/meta.json
//! <root>/cache/<hash>/<profile>.<encoding>.<codec version>/tokens.bin
//! <root>/cache/<hash>/<profile>.<encoding>.<codec version>/meta.json
//! ```

use std::path::{Path, PathBuf};
use tens_canonical::ContentHash;

/// Encoded bytes of a dataset.
pub const IR_FILE: &str = "ir.bin";
/// Metadata file of an entry. Written last; its presence commits the entry.
pub const META_FILE: &str = "meta.json";
/// Materialized ids as little-endian `u32`s.
pub const TOKENS_FILE: &str = "tokens.bin";
/// Prefix of in-progress directories and files.
pub const STAGING_PREFIX: &str = ".staging-";

/// Paths under a store root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of all dataset directories.
    pub fn ir_root(&self) -> PathBuf {
        self.root.join("ir")
    }

    /// Parent of all materialization directories.
    pub fn cache_root(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Directory of one dataset.
    pub fn ir_dir(&self, hash: &ContentHash) -> PathBuf {
        self.ir_root().join(hash.as_hex())
    }

    /// Directory of one materialization.
    pub fn cache_dir(
        &self,
        hash: &ContentHash,
        profile: &str,
        encoding_name: &str,
        codec_version: &str,
    ) -> PathBuf {
        self.cache_root()
            .join(hash.as_hex())
            .join(format!("{}.{}.{}", profile, encoding_name, codec_version))
    }
}
