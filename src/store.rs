//! Persistent key-value stores
//!
//! Each store is one JSON object file under the data directory. Keys are
//! dotted strings such as `<chat>.filesharing` or `<chat>.<user>`. Every write
//! is persisted before the call returns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, warn};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error
    #[error("Store I/O error for {path}: {source}")]
    Io {
        /// Store file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Value could not be (de)serialized
    #[error("Store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A JSON object persisted to `<dir>/<name>.json`
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonStore {
    /// Open or create a store.
    ///
    /// A corrupt file is logged and treated as empty; it is overwritten on the
    /// next write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a new store file
    /// cannot be written.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(format!("{name}.json"));

        let (data, exists) = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(data) => (data, true),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Corrupt store file, starting empty");
                    (Map::new(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Map::new(), false),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let store = Self {
            path,
            data: Mutex::new(data),
        };
        if !exists {
            let data = store.lock();
            store.persist(&data)?;
        }
        Ok(store)
    }

    /// Store file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed value for `key`, `None` if missing or of another type
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "Store value has unexpected type");
                None
            }
        }
    }

    /// Boolean flag with a default for missing keys
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get::<bool>(key).unwrap_or(default)
    }

    /// Set `key` and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or written.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        let mut data = self.lock();
        data.insert(key.to_string(), value);
        self.persist(&data)
    }

    /// Remove `key` and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.lock();
        if data.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&data)
    }

    /// Returns true if `key` is present
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Snapshot of every entry
    #[must_use]
    pub fn all(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write through a temporary file so a crash never leaves a torn store
    fn persist(&self, data: &Map<String, Value>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

/// The three stores used by the bot
pub struct Stores {
    /// Per-chat settings and feature flags
    pub settings: JsonStore,
    /// Warning counters keyed `<chat>.<user>`
    pub warnings: JsonStore,
    /// Chat locks keyed `<chat>.<user>.locked`
    pub vip: JsonStore,
}

impl Stores {
    /// Open all stores in `dir`
    ///
    /// # Errors
    ///
    /// Returns the first store that fails to open.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        Ok(Self {
            settings: JsonStore::open(dir, "settings")?,
            warnings: JsonStore::open(dir, "warnings")?,
            vip: JsonStore::open(dir, "vip")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonStore::open(dir.path(), "settings").expect("open");
        assert!(store.path().exists());
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_values_persist_across_reopen() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = JsonStore::open(dir.path(), "settings").expect("open");
            store.set("group@g.us.filesharing", false).expect("set");
            store.set("group@g.us.warningLimit", 5u32).expect("set");
            store.set("ai_blocklist", vec!["a@s.whatsapp.net"]).expect("set");
        }

        let store = JsonStore::open(dir.path(), "settings").expect("reopen");
        assert!(!store.get_bool("group@g.us.filesharing", true));
        assert_eq!(store.get::<u32>("group@g.us.warningLimit"), Some(5));
        assert_eq!(
            store.get::<Vec<String>>("ai_blocklist"),
            Some(vec!["a@s.whatsapp.net".to_string()])
        );
        assert!(store.get_bool("other.filesharing", true));
    }

    #[test]
    fn test_delete_and_has() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonStore::open(dir.path(), "warnings").expect("open");
        store.set("chat.user", 2).expect("set");
        assert!(store.has("chat.user"));
        store.delete("chat.user").expect("delete");
        assert!(!store.has("chat.user"));
        store.delete("missing").expect("delete missing");
    }

    #[test]
    fn test_wrong_type_is_none() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonStore::open(dir.path(), "vip").expect("open");
        store.set("chat.user.locked", "yes").expect("set");
        assert_eq!(store.get::<bool>("chat.user.locked"), None);
        assert!(!store.get_bool("chat.user.locked", false));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("settings.json"), "{not json").expect("write");
        let store = JsonStore::open(dir.path(), "settings").expect("open");
        assert!(store.all().is_empty());
        store.set("k", 1).expect("set overwrites");
    }
}
