//! Device-local persistence
//!
//! A small key/value layer standing in for browser local storage:
//! - `KeyValueBackend` stores opaque strings by key
//! - `FileBackend` keeps one JSON file per key, replaced atomically
//! - `MemoryBackend` keeps everything in a map (tests, ephemeral runs)
//! - `LocalEntry<T>` is a typed, JSON-encoded value under one key
//!
//! Writes never fail observably: a broken disk must not take the session
//! down. Failures are logged and remembered in [`LocalEntry::last_error`].

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use omega_model::AppState;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Key of the application document
pub const STATE_KEY: &str = "omega_v2_data";

/// Key of the sync bookkeeping
pub const SYNC_META_KEY: &str = "omega_sync_meta";

/// Key of the signed-in session
pub const SESSION_KEY: &str = "omega_session";

/// String storage by key
pub trait KeyValueBackend: Send + Sync {
    /// Read a value; `Ok(None)` if the key was never written
    ///
    /// # Errors
    /// Backend failure.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, replacing any previous one
    ///
    /// # Errors
    /// Backend failure.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Delete a value; deleting a missing key is not an error
    ///
    /// # Errors
    /// Backend failure.
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// One JSON file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Backend rooted at `dir` (created on first write)
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds `key`
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let io = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io)?;
        // write beside the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io)?;
        tmp.write_all(value.as_bytes()).map_err(io)?;
        tmp.as_file().sync_all().map_err(io)?;
        tmp.persist(self.path_for(key)).map_err(|e| io(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Typed JSON value stored under one key
pub struct LocalEntry<T> {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
    last_error: Mutex<Option<String>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for LocalEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEntry")
            .field("key", &self.key)
            .field("last_error", &*self.last_error.lock())
            .finish_non_exhaustive()
    }
}

impl<T> LocalEntry<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Entry for `key` on `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            last_error: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// Storage key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last stored value; `None` if absent or undecodable
    #[must_use]
    pub fn read(&self) -> Option<T> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "local read failed");
                *self.last_error.lock() = Some(e.to_string());
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(source) => {
                let e = CacheError::Decode {
                    key: self.key.clone(),
                    source,
                };
                warn!(key = %self.key, error = %e, "discarding undecodable local value");
                None
            }
        }
    }

    /// Store `value`, surfacing the failure
    ///
    /// # Errors
    /// Encode or backend failure.
    pub fn try_write(&self, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Encode {
            key: self.key.clone(),
            source,
        })?;
        self.backend.set(&self.key, &raw)?;
        debug!(key = %self.key, bytes = raw.len(), "local write");
        Ok(())
    }

    /// Store `value`; failures are logged and kept in [`Self::last_error`]
    pub fn write(&self, value: &T) {
        match self.try_write(value) {
            Ok(()) => *self.last_error.lock() = None,
            Err(e) => {
                error!(key = %self.key, error = %e, "local write failed");
                *self.last_error.lock() = Some(e.to_string());
            }
        }
    }

    /// Delete the stored value
    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(&self.key) {
            error!(key = %self.key, error = %e, "local clear failed");
            *self.last_error.lock() = Some(e.to_string());
        }
    }

    /// Message of the most recent failed operation, cleared by a good write
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

/// The application document's local mirror
pub type LocalCache = LocalEntry<AppState>;

impl LocalEntry<AppState> {
    /// Document entry under [`STATE_KEY`]
    #[must_use]
    pub fn app_state(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::new(backend, STATE_KEY)
    }
}

/// Sync bookkeeping kept beside the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Remote revision the local document was last reconciled with
    pub revision: Option<u64>,
    /// When that happened
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl LocalEntry<SyncMeta> {
    /// Metadata entry under [`SYNC_META_KEY`]
    #[must_use]
    pub fn sync_meta(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::new(backend, SYNC_META_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omega_model::{MonthKey, SeedOptions};

    struct BrokenBackend;

    impl KeyValueBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("disk gone".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("disk gone".into()))
        }
    }

    fn seeded() -> AppState {
        AppState::seed(&SeedOptions::new().with_month(MonthKey::new("March 2024")))
    }

    #[test]
    fn memory_entry_round_trip() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = LocalCache::app_state(backend.clone());
        assert!(cache.read().is_none());

        let state = seeded();
        cache.write(&state);
        assert_eq!(cache.read(), Some(state));
        assert!(backend.raw(STATE_KEY).is_some());
    }

    #[test]
    fn undecodable_value_reads_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set(STATE_KEY, "{not json").unwrap();
        let cache = LocalCache::app_state(backend);
        assert!(cache.read().is_none());
    }

    #[test]
    fn failed_write_is_remembered_not_raised() {
        let cache = LocalCache::app_state(Arc::new(BrokenBackend));
        cache.write(&seeded());
        assert!(cache.last_error().unwrap().contains("quota exceeded"));
        assert!(cache.read().is_none());
    }

    #[test]
    fn file_backend_replaces_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data"));

        backend.set("k", "one").unwrap();
        backend.set("k", "two").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("two"));
        assert!(backend.path_for("k").exists());

        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn sync_meta_round_trip() {
        let meta = LocalEntry::sync_meta(Arc::new(MemoryBackend::new()));
        let value = SyncMeta {
            revision: Some(7),
            last_synced_at: Some(Utc::now()),
        };
        meta.write(&value);
        assert_eq!(meta.read(), Some(value));
        meta.clear();
        assert_eq!(meta.read(), None);
    }
}
