//! Persistence of list-view state and the history-mode gate.
//!
//! The pipeline only relies on the async [`FilterStorage`] get/set contract.
//! Two implementations ship with the crate:
//!
//! - [`MemoryStorage`]: process-local map, used by tests and embedders that
//!   manage persistence themselves.
//! - [`JsonFileStorage`]: one pretty-printed JSON file per key inside a data
//!   directory, written atomically (temp file + rename).
//!
//! Keys are namespaced per list view: `filter_<storage_key>` for filter
//! definitions and `sorting_<storage_key>` for the sort choice.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value for '{key}' is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed serializing value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Key for the persisted filter definitions of one list view.
pub fn filter_key(storage_key: &str) -> String {
    format!("filter_{storage_key}")
}

/// Key for the persisted sort choice of one list view.
pub fn sort_key(storage_key: &str) -> String {
    format!("sorting_{storage_key}")
}

/// Async key-value store holding JSON documents.
#[async_trait]
pub trait FilterStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a key. Returns whether something was removed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// In-memory storage. Counts writes so callers can assert that frozen mode
/// really skipped persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous peek, bypassing the read counter.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Seed a value without counting it as a write.
    pub fn seed(&self, key: &str, value: Value) {
        self.entries.lock().insert(key.to_string(), value);
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FilterStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

/// File-backed storage: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a key. Characters outside `[A-Za-z0-9_.-]` are replaced
    /// so view keys like `motions/amendments` stay inside the directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl FilterStorage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.path_for(key);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Write {
                path: self.dir.clone(),
                source,
            })?;
        let payload = serde_json::to_vec_pretty(&value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload)
            .await
            .map_err(|source| StorageError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StorageError::Write { path, source })
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }
}

/// Runtime mode query used to suppress persistence.
pub trait ModeGate: Send + Sync {
    /// `true` while the view shows a frozen (historic) state.
    fn is_frozen(&self) -> bool;
}

/// History mode switch: frozen between [`HistoryMode::enter`] and
/// [`HistoryMode::leave`].
#[derive(Debug, Default)]
pub struct HistoryMode {
    frozen: AtomicBool,
}

impl HistoryMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frozen() -> Self {
        Self {
            frozen: AtomicBool::new(true),
        }
    }

    pub fn enter(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.frozen.store(false, Ordering::SeqCst);
    }
}

impl ModeGate for HistoryMode {
    fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }
}

/// Gate for views that never enter history mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLive;

impl ModeGate for AlwaysLive {
    fn is_frozen(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn key_format() {
        assert_eq!(filter_key("participants"), "filter_participants");
        assert_eq!(sort_key("motions"), "sorting_motions");
    }

    #[tokio::test]
    async fn memory_storage_round_trip_counts_writes() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.set("k", json!([1, 2])).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(json!([1, 2])));
        assert_eq!(storage.writes(), 1);
        assert_eq!(storage.reads(), 2);
        assert!(storage.remove("k").await.unwrap());
        assert!(!storage.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn file_storage_writes_atomically_and_reads_back() {
        let tmp = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(tmp.path().join("state"));
        assert_eq!(storage.get("filter_votes").await.unwrap(), None);

        storage
            .set("filter_votes", json!({"a": true}))
            .await
            .unwrap();
        let path = storage.path_for("filter_votes");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(
            storage.get("filter_votes").await.unwrap(),
            Some(json!({"a": true}))
        );
    }

    #[tokio::test]
    async fn file_storage_reports_corrupt_json() {
        let tmp = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(tmp.path());
        std::fs::write(storage.path_for("filter_x"), "{not json").unwrap();
        let err = storage.get("filter_x").await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[test]
    fn path_for_sanitizes_separators() {
        let storage = JsonFileStorage::new("/data");
        assert_eq!(
            storage.path_for("filter_motions/amendments"),
            PathBuf::from("/data/filter_motions_amendments.json")
        );
    }

    #[test]
    fn history_mode_toggles() {
        let mode = HistoryMode::new();
        assert!(!mode.is_frozen());
        mode.enter();
        assert!(mode.is_frozen());
        mode.leave();
        assert!(!mode.is_frozen());
        assert!(HistoryMode::frozen().is_frozen());
        assert!(!AlwaysLive.is_frozen());
    }
}
