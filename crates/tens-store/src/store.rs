//! Content-addressed store over a directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tens_canonical::ContentHash;
use tens_codec::{EncodedIr, FrameHeader};
use tens_materialize::{
    MaterializeOptions, MaterializedResult, Materializer, ProfileBinding,
    MATERIALIZE_CODEC_VERSION,
};
use tracing::{debug, info, warn};

use crate::atomic;
use crate::error::StoreError;
use crate::layout::{StoreLayout, IR_FILE, META_FILE, TOKENS_FILE};
use crate::meta::{CacheMeta, IrMeta, StoredSummary};
use crate::tokens;

/// Options for store writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Whether to fsync files and directories after each committed write (default: false).
    pub sync: bool,
}

/// Outcome of [`ContentStore::store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// Content hash the dataset is stored under.
    pub hash: ContentHash,
    /// `false` when the content was already present.
    pub is_new: bool,
    /// Size of the encoded bytes.
    pub byte_size: usize,
}

/// Store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Materializations answered from `cache/`.
    pub disk_hits: u64,
    /// Datasets and materializations written.
    pub disk_writes: u64,
    /// Cached materializations rewritten because the tokenizer changed.
    pub drift_rewrites: u64,
}

/// Persists encoded datasets by content hash and caches their
/// materializations on disk.
///
/// State lives entirely in the directory, so a store opened later on the
/// same root (in this process or another) sees everything written before.
/// There is no locking: concurrent writers of the same content race
/// harmlessly, and the first rename wins.
///
/// # Example
///
/// ```rust
/// use tens_codec::{Codec, TokenizerRegistry};
/// use tens_materialize::{MaterializeOptions, Materializer, MaterializerConfig};
/// use tens_store::ContentStore;
/// use serde_json::json;
///
/// let root = tempfile::TempDir::new()?;
/// let materializer =
///     Materializer::new(MaterializerConfig::default(), TokenizerRegistry::default())?;
/// let mut store = ContentStore::open(root.path(), materializer)?;
///
/// let ir = Codec::default().encode_json(&[json!({"id": 1})], "bytes")?;
/// assert!(store.store(&ir)?.is_new);
/// assert!(!store.store(&ir)?.is_new);
///
/// let ids = store.materialize_and_cache(ir.hash.as_hex(), "bytes", &MaterializeOptions::default())?;
/// assert_eq!(ids.source_hash, ir.hash);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ContentStore {
    layout: StoreLayout,
    materializer: Materializer,
    options: StoreOptions,
    stats: StoreStats,
}

impl ContentStore {
    /// Opens (creating if needed) a store at `root` with default options.
    pub fn open<P: AsRef<Path>>(root: P, materializer: Materializer) -> Result<Self, StoreError> {
        Self::open_with(root, materializer, StoreOptions::default())
    }

    /// Opens (creating if needed) a store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `ir/` or `cache/` cannot be created.
    pub fn open_with<P: AsRef<Path>>(
        root: P,
        materializer: Materializer,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let layout = StoreLayout::new(root.as_ref());
        fs::create_dir_all(layout.ir_root())?;
        fs::create_dir_all(layout.cache_root())?;
        Ok(Self {
            layout,
            materializer,
            options,
            stats: StoreStats::default(),
        })
    }

    /// Persists `ir` under its hash. Already-present content is left untouched
    /// and reported with `is_new = false`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if `ir.hash` is not the hash of
    /// `ir.bytes`, or an I/O error if the entry cannot be written.
    pub fn store(&mut self, ir: &EncodedIr) -> Result<StoreReceipt, StoreError> {
        let actual = ContentHash::of(&ir.bytes);
        if actual != ir.hash {
            return Err(StoreError::Corrupt {
                hash: ir.hash.to_string(),
                reason: format!("bytes hash to {}", actual),
            });
        }

        let receipt = |is_new| StoreReceipt {
            hash: ir.hash.clone(),
            is_new,
            byte_size: ir.byte_size(),
        };
        let target = self.layout.ir_dir(&ir.hash);
        if is_committed(&target) {
            debug!(hash = %ir.hash, "dataset already stored");
            return Ok(receipt(false));
        }

        let ir_root = self.layout.ir_root();
        let sync = self.options.sync;
        let staged = atomic::staging_dir(&ir_root)?;
        atomic::write_new(&staged.path().join(IR_FILE), &ir.bytes, sync)?;
        let meta = serde_json::to_vec_pretty(&IrMeta::for_ir(ir))?;
        atomic::write_new(&staged.path().join(META_FILE), &meta, sync)?;

        if let Err(err) = fs::rename(staged.path(), &target) {
            if is_committed(&target) {
                debug!(hash = %ir.hash, "dataset stored concurrently");
                return Ok(receipt(false));
            }
            return Err(err.into());
        }
        if sync {
            atomic::sync_dir(&ir_root)?;
        }

        self.stats.disk_writes += 1;
        info!(
            hash = %ir.hash,
            bytes = ir.byte_size(),
            rows = ir.row_count,
            encoding = %ir.encoding_name,
            "stored new dataset"
        );
        Ok(receipt(true))
    }

    /// Returns `true` if a dataset is stored under `hash`. Malformed hashes
    /// are never present.
    pub fn has(&self, hash: &str) -> bool {
        ContentHash::parse(hash)
            .map(|hash| is_committed(&self.layout.ir_dir(&hash)))
            .unwrap_or(false)
    }

    /// Reads a stored dataset back, verifying its bytes against the hash.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidHash`] for a malformed hash
    /// - [`StoreError::NotFound`] if nothing is stored under it
    /// - [`StoreError::Corrupt`] if the bytes or metadata do not match
    pub fn load(&self, hash: &str) -> Result<EncodedIr, StoreError> {
        let hash = ContentHash::parse(hash)?;
        self.load_entry(&hash)
    }

    /// Materializes a stored dataset for `profile`, reusing the ids cached
    /// under `cache/` unless the tokenizer's fingerprint changed since they
    /// were written.
    ///
    /// The full id list is cached; `options.max_tokens` only trims the
    /// returned copy.
    ///
    /// # Errors
    ///
    /// Same as [`ContentStore::load`], plus materialization errors for an
    /// unknown profile or encoding.
    pub fn materialize_and_cache(
        &mut self,
        hash: &str,
        profile: &str,
        options: &MaterializeOptions,
    ) -> Result<MaterializedResult, StoreError> {
        let hash = ContentHash::parse(hash)?;
        if !is_committed(&self.layout.ir_dir(&hash)) {
            return Err(StoreError::NotFound {
                hash: hash.to_string(),
            });
        }

        let binding = self.materializer.bind(profile)?;
        let dir = self.layout.cache_dir(
            &hash,
            binding.profile.as_str(),
            &binding.encoding_name,
            MATERIALIZE_CODEC_VERSION,
        );

        let full = match self.read_cached(&hash, &binding, &dir)? {
            Some(result) => {
                self.stats.disk_hits += 1;
                debug!(hash = %hash, profile = %binding.profile, "materialization disk hit");
                result
            }
            None => {
                let ir = self.load_entry(&hash)?;
                let result = self.materializer.render(&ir, &binding)?;
                self.write_cached(&dir, &result)?;
                self.stats.disk_writes += 1;
                result
            }
        };

        Ok(match options.max_tokens {
            Some(max) if max < full.id_count => full.truncated(max),
            _ => full,
        })
    }

    /// Summaries of every stored dataset, sorted by hash.
    pub fn list(&self) -> Result<Vec<StoredSummary>, StoreError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(self.layout.ir_root())? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Ok(hash) = ContentHash::parse(name) else {
                continue;
            };
            let meta_path = self.layout.ir_dir(&hash).join(META_FILE);
            if !meta_path.is_file() {
                continue;
            }
            let summary: StoredSummary = serde_json::from_slice(&fs::read(&meta_path)?)?;
            summaries.push(summary);
        }
        summaries.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(summaries)
    }

    /// Counters since the store was opened.
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Directory layout.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Store root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// The materializer used for cache misses.
    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Mutable access to the materializer, for in-memory materialization of
    /// loaded datasets.
    pub fn materializer_mut(&mut self) -> &mut Materializer {
        &mut self.materializer
    }

    fn load_entry(&self, hash: &ContentHash) -> Result<EncodedIr, StoreError> {
        let dir = self.layout.ir_dir(hash);
        if !is_committed(&dir) {
            return Err(StoreError::NotFound {
                hash: hash.to_string(),
            });
        }
        let corrupt = |reason: String| StoreError::Corrupt {
            hash: hash.to_string(),
            reason,
        };

        let bytes = match fs::read(dir.join(IR_FILE)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(corrupt(format!("{} is missing", IR_FILE)));
            }
            Err(err) => return Err(err.into()),
        };
        let actual = ContentHash::of(&bytes);
        if actual != *hash {
            return Err(corrupt(format!("{} hashes to {}", IR_FILE, actual)));
        }

        let meta: IrMeta = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)
            .map_err(|err| corrupt(format!("{}: {}", META_FILE, err)))?;
        if meta.hash != *hash {
            return Err(corrupt(format!("{} names {}", META_FILE, meta.hash)));
        }
        if meta.byte_size != bytes.len() {
            return Err(corrupt(format!(
                "{} records {} bytes, found {}",
                META_FILE,
                meta.byte_size,
                bytes.len()
            )));
        }
        let (header, _) = FrameHeader::from_bytes(&bytes)?;
        if header.encoding_name != meta.encoding_name {
            return Err(corrupt(format!(
                "header encoding {} disagrees with {} in {}",
                header.encoding_name, meta.encoding_name, META_FILE
            )));
        }

        Ok(meta.into_ir(bytes))
    }

    /// Reads a cached materialization; `None` means it must be (re)written.
    fn read_cached(
        &mut self,
        hash: &ContentHash,
        binding: &ProfileBinding,
        dir: &Path,
    ) -> Result<Option<MaterializedResult>, StoreError> {
        let Some(meta_bytes) = read_optional(&dir.join(META_FILE))? else {
            return Ok(None);
        };
        let meta: CacheMeta = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "unreadable cache metadata");
                return Ok(None);
            }
        };
        if meta.source_hash != *hash
            || meta.target_profile != binding.profile.as_str()
            || meta.encoding_name != binding.encoding_name
        {
            warn!(dir = %dir.display(), "cache metadata belongs to another entry");
            return Ok(None);
        }
        if meta.fingerprint != binding.fingerprint {
            self.stats.drift_rewrites += 1;
            warn!(
                hash = %hash,
                profile = %binding.profile,
                stored = %meta.fingerprint,
                current = %binding.fingerprint,
                "tokenizer fingerprint drifted; rematerializing"
            );
            return Ok(None);
        }

        let Some(token_bytes) = read_optional(&dir.join(TOKENS_FILE))? else {
            warn!(dir = %dir.display(), "cached ids are missing");
            return Ok(None);
        };
        let ids = match tokens::unpack(&token_bytes) {
            Some(ids) if ids.len() == meta.token_count => ids,
            _ => {
                warn!(
                    dir = %dir.display(),
                    bytes = token_bytes.len(),
                    expected = meta.token_count,
                    "cached ids are truncated or ragged"
                );
                return Ok(None);
            }
        };

        Ok(Some(MaterializedResult {
            id_count: ids.len(),
            ids,
            target_profile: meta.target_profile,
            encoding_name: meta.encoding_name,
            source_hash: meta.source_hash,
            codec_version: meta.codec_version,
            codec_fingerprint: meta.fingerprint,
        }))
    }

    /// Writes `tokens.bin`, then `meta.json` as the commit marker.
    fn write_cached(&self, dir: &Path, result: &MaterializedResult) -> Result<(), StoreError> {
        fs::create_dir_all(dir)?;
        let sync = self.options.sync;
        atomic::write_file(dir, TOKENS_FILE, &tokens::pack(&result.ids), sync)?;
        let meta = CacheMeta {
            source_hash: result.source_hash.clone(),
            target_profile: result.target_profile.clone(),
            encoding_name: result.encoding_name.clone(),
            codec_version: result.codec_version.clone(),
            token_count: result.id_count,
            fingerprint: result.codec_fingerprint.clone(),
            created_at: chrono::Utc::now(),
        };
        atomic::write_file(dir, META_FILE, &serde_json::to_vec_pretty(&meta)?, sync)?;
        debug!(dir = %dir.display(), ids = result.id_count, "cached materialization");
        Ok(())
    }
}

/// A dataset directory counts once its metadata is in place.
fn is_committed(dir: &Path) -> bool {
    dir.join(META_FILE).is_file()
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
