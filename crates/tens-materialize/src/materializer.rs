use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tens_canonical::ContentHash;
use tens_codec::{EncodedIr, EncoderOptions, Tokenizer, TokenizerRegistry};
use tracing::{debug, warn};

use crate::cache::{CacheKey, MaterializationCache};
use crate::errors::MaterializeError;
use crate::fingerprint::{fingerprint, FingerprintCache, FingerprintCheck};
use crate::profile::{default_profiles, ProfileId, ProfileTable};
use crate::text::{TensTextFormatter, TextFormatter};

/// Version tag of the text rendering that materialized ids are built from.
pub const MATERIALIZE_CODEC_VERSION: &str = "tt1";

/// Materializer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Profile id → encoding name (default: `bytes` → `bytes`).
    pub profiles: BTreeMap<String, String>,
    /// Maximum in-memory cache entries (default: 1000).
    pub cache_capacity: usize,
    /// Batch layout options for the text rendering. Set these to the codec's
    /// options so the rendering uses the same dictionary and framing.
    pub encoder: EncoderOptions,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            cache_capacity: 1000,
            encoder: EncoderOptions::default(),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializeOptions {
    /// Return at most this many ids. The cached result stays complete.
    pub max_tokens: Option<usize>,
}

/// Token ids of one dataset for one target profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedResult {
    /// Token ids.
    pub ids: Vec<u32>,
    /// Profile the ids were produced for.
    pub target_profile: String,
    /// Encoding the profile resolved to.
    pub encoding_name: String,
    /// Number of ids.
    pub id_count: usize,
    /// Content hash of the source dataset.
    pub source_hash: ContentHash,
    /// Text rendering version.
    pub codec_version: String,
    /// Tokenizer fingerprint at materialization time.
    pub codec_fingerprint: String,
}

impl MaterializedResult {
    /// Copy holding only the first `max_tokens` ids.
    pub fn truncated(&self, max_tokens: usize) -> Self {
        let ids: Vec<u32> = self.ids.iter().take(max_tokens).copied().collect();
        Self {
            id_count: ids.len(),
            ids,
            ..self.clone()
        }
    }
}

/// A resolved profile with its tokenizer's current fingerprint.
#[derive(Clone)]
pub struct ProfileBinding {
    /// Profile id.
    pub profile: ProfileId,
    /// Encoding name.
    pub encoding_name: String,
    /// Current tokenizer fingerprint.
    pub fingerprint: String,
    /// Tokenizer for the encoding.
    pub tokenizer: Arc<dyn Tokenizer>,
}

/// Materializer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializerStats {
    /// Calls answered from the memory cache.
    pub hits: u64,
    /// Calls that tokenized.
    pub misses: u64,
    /// Entries evicted for capacity.
    pub evictions: u64,
    /// Fingerprint changes observed.
    pub drift_events: u64,
}

/// Converts encoded datasets into target-specific token ids.
///
/// Holds its own result cache and fingerprint cache, so independent
/// materializers do not share state. Methods take `&mut self`; callers that
/// share one instance across threads wrap it in a mutex.
pub struct Materializer {
    profiles: ProfileTable,
    tokenizers: TokenizerRegistry,
    formatter: Box<dyn TextFormatter>,
    cache: MaterializationCache,
    fingerprints: FingerprintCache,
    stats: MaterializerStats,
}

impl Materializer {
    /// Creates a materializer with the default text formatter.
    pub fn new(
        config: MaterializerConfig,
        tokenizers: TokenizerRegistry,
    ) -> Result<Self, MaterializeError> {
        Ok(Self {
            profiles: ProfileTable::from_map(&config.profiles)?,
            tokenizers,
            formatter: Box::new(TensTextFormatter::new(config.encoder)),
            cache: MaterializationCache::new(config.cache_capacity),
            fingerprints: FingerprintCache::new(),
            stats: MaterializerStats::default(),
        })
    }

    /// Replaces the text formatter.
    pub fn with_formatter(mut self, formatter: Box<dyn TextFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Resolves `profile` and fingerprints its tokenizer.
    ///
    /// A fingerprint different from the one last seen for the encoding is
    /// drift: cached results for that encoding are dropped.
    pub fn bind(&mut self, profile: &str) -> Result<ProfileBinding, MaterializeError> {
        let (profile, encoding_name) = self.profiles.resolve(profile)?;
        let encoding_name = encoding_name.to_string();
        let tokenizer = self.tokenizers.get(&encoding_name).ok_or_else(|| {
            MaterializeError::UnknownEncoding {
                profile: profile.to_string(),
                encoding: encoding_name.clone(),
            }
        })?;

        let current = fingerprint(tokenizer.as_ref());
        if let FingerprintCheck::Drifted { previous } =
            self.fingerprints.check(&encoding_name, &current)
        {
            let dropped = self.cache.remove_encoding(&encoding_name);
            self.stats.drift_events += 1;
            warn!(
                encoding = %encoding_name,
                previous = %previous,
                current = %current,
                dropped,
                "tokenizer fingerprint drifted"
            );
        }

        Ok(ProfileBinding {
            profile,
            encoding_name,
            fingerprint: current,
            tokenizer,
        })
    }

    /// Materializes `ir` for `profile`.
    ///
    /// Repeated calls for the same dataset and profile return the same `Arc`
    /// until drift or eviction. With `max_tokens` a truncated copy is returned.
    pub fn materialize(
        &mut self,
        ir: &EncodedIr,
        profile: &str,
        options: &MaterializeOptions,
    ) -> Result<Arc<MaterializedResult>, MaterializeError> {
        let binding = self.bind(profile)?;
        let key = CacheKey {
            source_hash: ir.hash.clone(),
            profile: binding.profile.clone(),
        };

        let full = match self.cache.get(&key) {
            Some(hit) if hit.codec_fingerprint == binding.fingerprint => {
                self.stats.hits += 1;
                debug!(hash = %ir.hash, profile = %binding.profile, "materialization cache hit");
                hit
            }
            _ => {
                self.stats.misses += 1;
                let result = Arc::new(self.render(ir, &binding)?);
                let evicted = self.cache.insert(key, Arc::clone(&result));
                self.stats.evictions += evicted as u64;
                result
            }
        };

        Ok(match options.max_tokens {
            Some(max) if max < full.id_count => Arc::new(full.truncated(max)),
            _ => full,
        })
    }

    /// Formats and tokenizes `ir` without touching the cache.
    pub fn render(
        &self,
        ir: &EncodedIr,
        binding: &ProfileBinding,
    ) -> Result<MaterializedResult, MaterializeError> {
        let text = self.formatter.format(ir)?;
        let ids = binding.tokenizer.tokenize(&text);
        debug!(
            hash = %ir.hash,
            profile = %binding.profile,
            ids = ids.len(),
            text_bytes = text.len(),
            "materialized dataset"
        );
        Ok(MaterializedResult {
            id_count: ids.len(),
            ids,
            target_profile: binding.profile.to_string(),
            encoding_name: binding.encoding_name.clone(),
            source_hash: ir.hash.clone(),
            codec_version: MATERIALIZE_CODEC_VERSION.to_string(),
            codec_fingerprint: binding.fingerprint.clone(),
        })
    }

    /// Counters since creation.
    pub fn stats(&self) -> MaterializerStats {
        self.stats
    }

    /// Number of cached results.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Configured profile ids.
    pub fn profile_ids(&self) -> Vec<String> {
        self.profiles.ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tens_codec::Codec;

    fn ir() -> EncodedIr {
        Codec::default()
            .encode_json(&[json!({"id": 1, "name": "Test"})], "bytes")
            .unwrap()
    }

    fn materializer() -> Materializer {
        Materializer::new(MaterializerConfig::default(), TokenizerRegistry::default()).unwrap()
    }

    #[test]
    fn truncated_copy_keeps_prefix() {
        let full = MaterializedResult {
            ids: vec![1, 2, 3, 4],
            target_profile: "bytes".into(),
            encoding_name: "bytes".into(),
            id_count: 4,
            source_hash: ContentHash::of(b""),
            codec_version: MATERIALIZE_CODEC_VERSION.into(),
            codec_fingerprint: String::new(),
        };
        let cut = full.truncated(2);
        assert_eq!(cut.ids, vec![1, 2]);
        assert_eq!(cut.id_count, 2);
        assert_eq!(full.truncated(10), full);
    }

    #[test]
    fn ids_are_the_tokenized_text_rendering() {
        let ir = ir();
        let mut m = materializer();
        let result = m.materialize(&ir, "bytes", &MaterializeOptions::default()).unwrap();
        let text = TensTextFormatter::default().format(&ir).unwrap();
        let expected: Vec<u32> = text.bytes().map(u32::from).collect();
        assert_eq!(result.ids, expected);
        assert_eq!(result.id_count, expected.len());
        assert_eq!(result.codec_version, "tt1");
        assert_eq!(result.source_hash, ir.hash);
    }

    #[test]
    fn profile_with_unregistered_encoding_is_rejected() {
        let mut config = MaterializerConfig::default();
        config
            .profiles
            .insert("gpt-4o".to_string(), "o200k_base".to_string());
        let mut m = Materializer::new(config, TokenizerRegistry::default()).unwrap();
        assert!(matches!(
            m.materialize(&ir(), "gpt-4o", &MaterializeOptions::default()),
            Err(MaterializeError::UnknownEncoding { .. })
        ));
    }

    #[test]
    fn invalid_profile_ids_fail_construction() {
        let mut config = MaterializerConfig::default();
        config.profiles.insert("bad/id".to_string(), "bytes".to_string());
        assert!(matches!(
            Materializer::new(config, TokenizerRegistry::default()),
            Err(MaterializeError::InvalidProfile(_))
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: MaterializerConfig = serde_json::from_str(r#"{"cache_capacity": 5}"#).unwrap();
        assert_eq!(config.cache_capacity, 5);
        assert_eq!(config.profiles, default_profiles());
        assert_eq!(config.encoder, EncoderOptions::default());
    }

    #[test]
    fn rendering_follows_configured_encoder_options() {
        let options = EncoderOptions {
            dictionary: false,
            ..EncoderOptions::default()
        };
        let ir = Codec::new(TokenizerRegistry::default(), options.clone())
            .encode_json(&[json!({"d": "eng"}), json!({"d": "eng"})], "bytes")
            .unwrap();

        let config = MaterializerConfig {
            encoder: options.clone(),
            ..MaterializerConfig::default()
        };
        let mut m = Materializer::new(config, TokenizerRegistry::default()).unwrap();
        let result = m.materialize(&ir, "bytes", &MaterializeOptions::default()).unwrap();
        let text = String::from_utf8(result.ids.iter().map(|&id| id as u8).collect()).unwrap();
        assert!(!text.contains("@dict"));
        assert_eq!(text, TensTextFormatter::new(options).format(&ir).unwrap());
    }
}
