//! Key-value persistence for preferences and modes.
//!
//! Records are stored under versioned keys and carry their schema version, so
//! an older shape is detected and replaced by defaults instead of failing.
//! Loading never errors: anything unreadable falls back to defaults with a
//! warning.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::mode::{Mode, ModeBook};
use crate::settings::Settings;

pub const SCHEMA_VERSION: u32 = 2;
pub const SETTINGS_KEY: &str = "rtmark.settings.v2";
pub const MODES_KEY: &str = "rtmark.modes.v2";
const LEGACY_KEYS: [&str; 2] = ["rtmark.settings.v1", "rtmark.modes.v1"];

/// A string-to-string store. Implementations must be shareable across threads
/// because the access gate reads its secret from one on every request.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    fn insert(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_owned(), value.to_owned());
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory. Writes go through a temporary file and
/// a rename so a crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StoreError::InvalidKey { key: key.to_owned() });
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, value).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Record<T> {
    version: u32,
    data: T,
}

#[derive(Debug, Serialize)]
struct ModesRef<'a> {
    modes: &'a BTreeMap<String, Mode>,
    active: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModesOwned {
    modes: BTreeMap<String, Mode>,
    active: String,
}

fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "no stored record");
            return None;
        }
        Err(err) => {
            warn!(key, error = %err, "preference store unavailable, using defaults");
            return None;
        }
    };
    // Check the version before the payload so an old shape is reported as such.
    let version = serde_json::from_str::<serde_json::Value>(&raw)
        .ok()
        .and_then(|v| v.get("version").and_then(serde_json::Value::as_u64));
    if version != Some(u64::from(SCHEMA_VERSION)) {
        warn!(key, ?version, expected = SCHEMA_VERSION, "stored record has another schema version, using defaults");
        return None;
    }
    match serde_json::from_str::<Record<T>>(&raw) {
        Ok(record) => Some(record.data),
        Err(err) => {
            warn!(key, error = %err, "malformed stored record, using defaults");
            None
        }
    }
}

fn save_record<T: Serialize>(store: &dyn KeyValueStore, key: &str, data: T) -> Result<(), StoreError> {
    let record = Record {
        version: SCHEMA_VERSION,
        data,
    };
    let json = serde_json::to_string_pretty(&record).map_err(|source| StoreError::Json {
        key: key.to_owned(),
        source,
    })?;
    store.set(key, &json)
}

/// Stored settings, or defaults if absent, unreadable or of another version.
pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    if let Some(settings) = load_record(store, SETTINGS_KEY) {
        return settings;
    }
    for key in LEGACY_KEYS {
        if matches!(store.get(key), Ok(Some(_))) {
            info!(key, "ignoring record from an older release");
        }
    }
    Settings::default()
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<(), StoreError> {
    save_record(store, SETTINGS_KEY, settings)
}

/// Stored modes, or `None` when nothing usable is stored.
pub fn load_modes(store: &dyn KeyValueStore) -> Option<ModeBook> {
    load_record::<ModesOwned>(store, MODES_KEY)
        .map(|stored| ModeBook::from_parts(stored.modes, stored.active))
}

pub fn save_modes(store: &dyn KeyValueStore, book: &ModeBook) -> Result<(), StoreError> {
    save_record(
        store,
        MODES_KEY,
        ModesRef {
            modes: book.modes(),
            active: book.active_name(),
        },
    )
}
