use serde_json::json;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tens_codec::{ByteTokenizer, Codec, EncodedIr, Tokenizer, TokenizerError, TokenizerRegistry};
use tens_materialize::{MaterializeOptions, Materializer, MaterializerConfig};
use tens_store::{ContentStore, StoreError, StoreOptions};

fn dataset(seed: i64) -> EncodedIr {
    let rows: Vec<_> = (0..8)
        .map(|i| {
            json!({
                "id": seed * 100 + i,
                "department": (["Engineering", "Sales"][(i % 2) as usize]),
                "score": i as f64 / 4.0,
            })
        })
        .collect();
    Codec::default().encode_json(&rows, "bytes").unwrap()
}

fn materializer() -> Materializer {
    Materializer::new(MaterializerConfig::default(), TokenizerRegistry::default()).unwrap()
}

fn full() -> MaterializeOptions {
    MaterializeOptions::default()
}

#[test]
fn test_store_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(1);

    let first = store.store(&ir).unwrap();
    assert!(first.is_new);
    assert_eq!(first.hash, ir.hash);
    assert_eq!(first.byte_size, ir.bytes.len());

    let meta_path = temp_dir
        .path()
        .join("ir")
        .join(ir.hash.as_hex())
        .join("meta.json");
    let before = fs::read(&meta_path).unwrap();

    let second = store.store(&ir).unwrap();
    assert!(!second.is_new);
    assert_eq!(second.hash, first.hash);
    assert_eq!(fs::read(&meta_path).unwrap(), before);
    assert_eq!(store.stats().disk_writes, 1);
}

#[test]
fn test_load_returns_the_stored_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(2);
    store.store(&ir).unwrap();

    let loaded = store.load(ir.hash.as_hex()).unwrap();
    assert_eq!(loaded, ir);
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let ir = dataset(3);

    let first_ids = {
        let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
        store.store(&ir).unwrap();
        let result = store
            .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
            .unwrap();
        assert_eq!(store.stats().disk_hits, 0);
        result.ids
    };

    let mut reopened = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    assert!(reopened.has(ir.hash.as_hex()));
    assert_eq!(
        reopened.load(ir.hash.as_hex()).unwrap().canonical_data,
        ir.canonical_data
    );

    let again = reopened
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();
    assert_eq!(again.ids, first_ids);
    assert_eq!(reopened.stats().disk_hits, 1);
    assert_eq!(reopened.stats().disk_writes, 0);
}

#[test]
fn test_cached_ids_match_in_memory_materialization() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(4);
    store.store(&ir).unwrap();

    let cached = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();
    let direct = materializer().materialize(&ir, "bytes", &full()).unwrap();
    assert_eq!(cached, *direct);
}

#[test]
fn test_tokens_file_is_raw_little_endian() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(5);
    store.store(&ir).unwrap();
    let result = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();

    let tokens_path = temp_dir
        .path()
        .join("cache")
        .join(ir.hash.as_hex())
        .join("bytes.bytes.tt1")
        .join("tokens.bin");
    let bytes = fs::read(tokens_path).unwrap();
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(bytes.len(), result.id_count * 4);
    assert_eq!(
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        result.ids[0]
    );
}

#[test]
fn test_max_tokens_trims_result_but_not_cache() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(6);
    store.store(&ir).unwrap();

    let cut = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &MaterializeOptions { max_tokens: Some(5) })
        .unwrap();
    assert_eq!(cut.id_count, 5);

    let whole = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();
    assert!(whole.id_count > 5);
    assert_eq!(&whole.ids[..5], &cut.ids[..]);
    assert_eq!(store.stats().disk_hits, 1);
}

#[test]
fn test_list_is_sorted_by_hash() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let datasets: Vec<EncodedIr> = (10..14).map(dataset).collect();
    for ir in &datasets {
        store.store(ir).unwrap();
    }
    fs::create_dir(temp_dir.path().join("ir").join(".staging-leftover")).unwrap();

    let summaries = store.list().unwrap();
    let mut expected: Vec<String> = datasets.iter().map(|ir| ir.hash.to_string()).collect();
    expected.sort();
    let listed: Vec<String> = summaries.iter().map(|s| s.hash.to_string()).collect();
    assert_eq!(listed, expected);
    assert!(summaries.iter().all(|s| s.row_count == 8 && s.encoding_name == "bytes"));
}

#[test]
fn test_unknown_hash_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let missing = "0".repeat(64);

    assert!(!store.has(&missing));
    assert!(matches!(store.load(&missing), Err(StoreError::NotFound { .. })));
    assert!(matches!(
        store.materialize_and_cache(&missing, "bytes", &full()),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn test_malformed_hash_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    assert!(!store.has("../ir"));
    assert!(matches!(store.load("../ir"), Err(StoreError::InvalidHash(_))));
}

#[test]
fn test_unknown_profile_is_a_materialize_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = ContentStore::open(temp_dir.path(), materializer()).unwrap();
    let ir = dataset(7);
    store.store(&ir).unwrap();
    assert!(matches!(
        store.materialize_and_cache(ir.hash.as_hex(), "gpt-5", &full()),
        Err(StoreError::Materialize(_))
    ));
}

#[test]
fn test_sync_option_writes_the_same_entries() {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions { sync: true };
    let mut store = ContentStore::open_with(temp_dir.path(), materializer(), options).unwrap();
    let ir = dataset(8);
    assert!(store.store(&ir).unwrap().is_new);
    store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();
    assert_eq!(store.load(ir.hash.as_hex()).unwrap(), ir);
}

/// Byte tokenizer whose ids can be shifted at runtime, standing in for a
/// tokenizer library upgrade between runs.
#[derive(Default)]
struct SwitchableTokenizer {
    shifted: AtomicBool,
}

impl Tokenizer for SwitchableTokenizer {
    fn encoding_name(&self) -> &str {
        "switchable"
    }

    fn vocab_size(&self) -> u32 {
        257
    }

    fn tokenize(&self, text: &str) -> Vec<u32> {
        let offset = u32::from(self.shifted.load(Ordering::SeqCst));
        text.bytes().map(|b| u32::from(b) + offset).collect()
    }

    fn detokenize(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let offset = u32::from(self.shifted.load(Ordering::SeqCst));
        let shifted: Vec<u32> = ids.iter().map(|id| id.saturating_sub(offset)).collect();
        ByteTokenizer.detokenize(&shifted)
    }
}

fn switchable_materializer(tokenizer: Arc<SwitchableTokenizer>) -> Materializer {
    let mut registry = TokenizerRegistry::default();
    registry.register(tokenizer);
    let mut config = MaterializerConfig::default();
    config
        .profiles
        .insert("switch".to_string(), "switchable".to_string());
    Materializer::new(config, registry).unwrap()
}

#[test]
fn test_fingerprint_drift_rewrites_cache() {
    let temp_dir = TempDir::new().unwrap();
    let ir = dataset(9);

    let tokenizer = Arc::new(SwitchableTokenizer::default());
    let before = {
        let mut store =
            ContentStore::open(temp_dir.path(), switchable_materializer(tokenizer.clone())).unwrap();
        store.store(&ir).unwrap();
        store
            .materialize_and_cache(ir.hash.as_hex(), "switch", &full())
            .unwrap()
    };

    // A later run with an upgraded tokenizer.
    let upgraded = Arc::new(SwitchableTokenizer::default());
    upgraded.shifted.store(true, Ordering::SeqCst);
    let mut store =
        ContentStore::open(temp_dir.path(), switchable_materializer(upgraded)).unwrap();

    let after = store
        .materialize_and_cache(ir.hash.as_hex(), "switch", &full())
        .unwrap();
    assert_eq!(store.stats().drift_rewrites, 1);
    assert_eq!(store.stats().disk_hits, 0);
    assert_ne!(after.codec_fingerprint, before.codec_fingerprint);
    assert_eq!(after.ids[0], before.ids[0] + 1);

    let settled = store
        .materialize_and_cache(ir.hash.as_hex(), "switch", &full())
        .unwrap();
    assert_eq!(settled, after);
    assert_eq!(store.stats().disk_hits, 1);
    assert_eq!(store.stats().drift_rewrites, 1);
}

#[test]
fn test_drift_within_one_store() {
    let temp_dir = TempDir::new().unwrap();
    let tokenizer = Arc::new(SwitchableTokenizer::default());
    let mut store =
        ContentStore::open(temp_dir.path(), switchable_materializer(tokenizer.clone())).unwrap();
    let ir = dataset(10);
    store.store(&ir).unwrap();

    let before = store
        .materialize_and_cache(ir.hash.as_hex(), "switch", &full())
        .unwrap();
    let bytes_before = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();

    tokenizer.shifted.store(true, Ordering::SeqCst);
    let after = store
        .materialize_and_cache(ir.hash.as_hex(), "switch", &full())
        .unwrap();
    assert_ne!(after.ids, before.ids);
    assert_eq!(store.stats().drift_rewrites, 1);

    // Other profiles keep their cached ids.
    let bytes_after = store
        .materialize_and_cache(ir.hash.as_hex(), "bytes", &full())
        .unwrap();
    assert_eq!(bytes_after, bytes_before);
    assert_eq!(store.materializer().stats().drift_events, 1);
}
