// ===============================
// src/store.rs (key-value persistence)
// ===============================
//
// The desk only needs get/put of strings. Values are JSON-encoded per key.
// - MemoryStore  : in-process map (tests, --memory)
// - JsonFileStore: one JSON object on disk, rewritten on every put
//
// Reads never fail the caller: a missing or malformed value falls back to the
// built-in default for that field (logged).
//
use ahash::AHashMap as HashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::{Annotation, CompoundingConfig, CompoundingMode, TradeRecord};

pub const KEY_INITIAL_BALANCE: &str = "initial_balance";
pub const KEY_RATE: &str = "rate";
pub const KEY_STEP_COUNT: &str = "step_count";
pub const KEY_MODE: &str = "mode";
pub const KEY_TIMER_SECS: &str = "timer_secs";
pub const KEY_LEDGER: &str = "ledger";
pub const KEY_LEDGER_CONFIG: &str = "ledger_config";
pub const KEY_ANNOTATIONS: &str = "annotations";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> { self.map.get(key).cloned() }
    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }
}

/// Whole map kept in memory and flushed to `path` on each put.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    map: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens `path`; an unreadable or corrupt file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let map = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(?e, path = %path.display(), "store: corrupt file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(?e, path = %path.display(), "store: read failed, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, map }
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.map)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> { self.map.get(key).cloned() }
    fn put(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        self.flush()
    }
}

fn read_or<V: DeserializeOwned>(store: &dyn KvStore, key: &str, default: V) -> V {
    match store.get(key) {
        None => default,
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(?e, %key, "store: malformed value, using default");
            default
        }),
    }
}

fn write<V: Serialize + ?Sized>(store: &mut dyn KvStore, key: &str, value: &V) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, raw)
}

/// Everything the desk persists between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Form inputs, possibly edited since the last calculation.
    pub config: CompoundingConfig,
    pub timer_secs: u32,
    /// Config `ledger` was generated from.
    pub ledger_config: CompoundingConfig,
    pub ledger: Vec<TradeRecord>,
    pub annotations: BTreeMap<u32, Annotation>,
}

pub fn load(store: &dyn KvStore, defaults: CompoundingConfig, default_timer_secs: u32) -> Snapshot {
    let config = CompoundingConfig {
        initial_balance: read_or(store, KEY_INITIAL_BALANCE, defaults.initial_balance),
        rate: read_or(store, KEY_RATE, defaults.rate),
        step_count: read_or(store, KEY_STEP_COUNT, defaults.step_count),
        mode: read_or::<CompoundingMode>(store, KEY_MODE, defaults.mode),
    };
    let ledger: Vec<TradeRecord> = read_or(store, KEY_LEDGER, Vec::new());
    let ledger = if crate::ledger::is_chained(&ledger) && ledger.first().map_or(true, |r| r.sequence_index == 0) {
        ledger
    } else {
        warn!("store: stored ledger is not a valid chain, dropping it");
        Vec::new()
    };
    Snapshot {
        config,
        timer_secs: read_or(store, KEY_TIMER_SECS, default_timer_secs),
        // stores written before this key existed: best guess is the draft
        ledger_config: read_or(store, KEY_LEDGER_CONFIG, config),
        ledger,
        annotations: read_or(store, KEY_ANNOTATIONS, BTreeMap::new()),
    }
}

/// Writes every field; stops at the first failure and returns it.
pub fn save(store: &mut dyn KvStore, snap: &Snapshot) -> Result<(), StoreError> {
    write(store, KEY_INITIAL_BALANCE, &snap.config.initial_balance)?;
    write(store, KEY_RATE, &snap.config.rate)?;
    write(store, KEY_STEP_COUNT, &snap.config.step_count)?;
    write(store, KEY_MODE, &snap.config.mode)?;
    write(store, KEY_TIMER_SECS, &snap.timer_secs)?;
    write(store, KEY_LEDGER_CONFIG, &snap.ledger_config)?;
    write(store, KEY_LEDGER, &snap.ledger)?;
    write(store, KEY_ANNOTATIONS, &snap.annotations)
}

/// Save, but only log on failure: in-memory state stays authoritative.
pub fn save_logged(store: &mut dyn KvStore, snap: &Snapshot) -> bool {
    match save(store, snap) {
        Ok(()) => true,
        Err(e) => {
            error!(?e, "store: save failed, continuing with unsaved changes");
            crate::metrics::STORE_WRITE_ERRORS.inc();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NoteStatus;
    use crate::ledger;
    use tempfile::tempdir;

    struct FailingStore;
    impl KvStore for FailingStore {
        fn get(&self, _key: &str) -> Option<String> { None }
        fn put(&mut self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only")))
        }
    }

    fn sample() -> Snapshot {
        let config = CompoundingConfig { initial_balance: 250.0, step_count: 4, mode: CompoundingMode::Fixed, rate: -10.0 };
        let mut annotations = BTreeMap::new();
        annotations.insert(2, Annotation { note: "stopped out".into(), status: NoteStatus::Loss });
        let ledger_config = CompoundingConfig { rate: -5.0, ..config };
        Snapshot { config, timer_secs: 15, ledger_config, ledger: ledger::generate(&ledger_config), annotations }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let snap = load(&store, CompoundingConfig::default(), 10);
        assert_eq!(snap.config, CompoundingConfig::default());
        assert_eq!(snap.timer_secs, 10);
        assert!(snap.ledger.is_empty());
        assert!(snap.annotations.is_empty());
        assert_eq!(snap.ledger_config, CompoundingConfig::default());
    }

    #[test]
    fn ledger_config_is_stored_apart_from_draft() {
        let mut store = MemoryStore::new();
        let snap = sample();
        save(&mut store, &snap).unwrap();
        let back = load(&store, CompoundingConfig::default(), 10);
        assert_eq!(back.config.rate, -10.0);
        assert_eq!(back.ledger_config.rate, -5.0);
    }

    #[test]
    fn missing_ledger_config_falls_back_to_draft() {
        let mut store = MemoryStore::new();
        store.put(KEY_RATE, "7.5".into()).unwrap();
        let snap = load(&store, CompoundingConfig::default(), 10);
        assert_eq!(snap.ledger_config, snap.config);
    }

    #[test]
    fn malformed_fields_fall_back_individually() {
        let mut store = MemoryStore::new();
        store.put(KEY_INITIAL_BALANCE, "not json".into()).unwrap();
        store.put(KEY_RATE, "12.5".into()).unwrap();
        store.put(KEY_MODE, "\"sideways\"".into()).unwrap();
        store.put(KEY_TIMER_SECS, "-3".into()).unwrap();

        let snap = load(&store, CompoundingConfig::default(), 10);
        assert_eq!(snap.config.initial_balance, 100.0);
        assert_eq!(snap.config.rate, 12.5);
        assert_eq!(snap.config.mode, CompoundingMode::Percentage);
        assert_eq!(snap.timer_secs, 10);
    }

    #[test]
    fn broken_chain_is_discarded() {
        let mut store = MemoryStore::new();
        let mut ledger = sample().ledger;
        ledger[2].opening_balance += 1.0;
        store.put(KEY_LEDGER, serde_json::to_string(&ledger).unwrap()).unwrap();
        let snap = load(&store, CompoundingConfig::default(), 10);
        assert!(snap.ledger.is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let snap = sample();
        {
            let mut store = JsonFileStore::open(&path);
            assert!(save_logged(&mut store, &snap));
        }
        let store = JsonFileStore::open(&path);
        let back = load(&store, CompoundingConfig::default(), 10);
        assert_eq!(back, snap);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ this is not json").unwrap();
        let store = JsonFileStore::open(&path);
        assert!(store.get(KEY_RATE).is_none());
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let mut store = FailingStore;
        assert!(!save_logged(&mut store, &sample()));
        assert!(save(&mut store, &sample()).is_err());
    }
}
