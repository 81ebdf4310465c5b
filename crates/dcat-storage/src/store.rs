//! Preference store backends

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, StorageError};

/// String key-value store holding serialized preferences
pub trait PreferenceStore: Send + Sync {
    /// Prepare the store for use
    ///
    /// # Errors
    /// Backend-specific failure opening the store
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Read the raw value stored under `key`
    ///
    /// # Errors
    /// Backend failure; a missing key is `Ok(None)`
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Backend failure persisting the value
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    ///
    /// # Errors
    /// Backend failure persisting the removal
    fn remove(&self, key: &str) -> Result<()>;

    /// List stored keys in sorted order
    ///
    /// # Errors
    /// Backend failure reading the store
    fn keys(&self) -> Result<Vec<String>>;

    /// Release the store; later calls fail with [`StorageError::Closed`]
    ///
    /// # Errors
    /// Backend failure flushing the store
    fn teardown(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process store
///
/// Usable right away; `init` after `teardown` reopens it empty.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    closed: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryStore {
    fn init(&self) -> Result<()> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn teardown(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }
}

/// Store persisted as one JSON object in a file
///
/// Every write replaces the file atomically: temp file in the same
/// directory, then rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Option<BTreeMap<String, String>>>,
    reset_on_open: AtomicBool,
}

impl FileStore {
    /// Create a store backed by `path`; call [`PreferenceStore::init`] before use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(None),
            reset_on_open: AtomicBool::new(false),
        }
    }

    /// Create and initialize a store backed by `path`
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.init()?;
        Ok(store)
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file was unreadable as JSON and was reset on open
    #[must_use]
    pub fn was_reset(&self) -> bool {
        self.reset_on_open.load(Ordering::Relaxed)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(StorageError::io(&self.path, err)),
        };
        match serde_json::from_str(&text) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt preference file, starting empty");
                self.reset_on_open.store(true, Ordering::Relaxed);
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::encode(self.path.display().to_string(), e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
        std::io::Write::write_all(&mut tmp, &body).map_err(|e| StorageError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::io(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), keys = entries.len(), "preferences saved");
        Ok(())
    }

    /// Apply a change to a copy of the entries and keep it only once persisted
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let mut guard = self.entries.write();
        let entries = guard.as_mut().ok_or(StorageError::Closed)?;
        let mut next = entries.clone();
        if apply(&mut next) {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(())
    }
}

impl PreferenceStore for FileStore {
    fn init(&self) -> Result<()> {
        let mut guard = self.entries.write();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(entries.keys().cloned().collect())
    }

    fn teardown(&self) -> Result<()> {
        self.entries.write().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert!(store.read("a").unwrap().is_none());

        store.write("b", "2").unwrap();
        store.write("a", "1").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        store.remove("a").unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.len(), 1);

        store.teardown().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_store_closed_after_teardown() {
        let store = MemoryStore::new();
        store.write("k", "v").unwrap();
        store.teardown().unwrap();

        assert!(matches!(store.write("k", "v"), Err(StorageError::Closed)));
        assert!(matches!(store.read("k"), Err(StorageError::Closed)));
        assert!(matches!(store.remove("k"), Err(StorageError::Closed)));
        assert!(matches!(store.keys(), Err(StorageError::Closed)));

        store.init().unwrap();
        assert!(store.read("k").unwrap().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = FileStore::open(&path).unwrap();
        store.write("user", r#"{"userId":"u1"}"#).unwrap();
        store.write("sqlState", "true").unwrap();
        store.remove("sqlState").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["user"]);
        assert_eq!(
            reopened.read("user").unwrap().as_deref(),
            Some(r#"{"userId":"u1"}"#)
        );
        assert!(!reopened.was_reset());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(store.was_reset());

        store.write("k", "v").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"k\""));
    }

    #[test]
    fn file_store_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("prefs.json"));
        assert!(matches!(store.read("k"), Err(StorageError::Closed)));

        store.init().unwrap();
        store.write("k", "v").unwrap();
        store.teardown().unwrap();
        assert!(matches!(store.write("k", "v"), Err(StorageError::Closed)));
    }

    #[test]
    fn failed_persist_leaves_entries_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let store = FileStore::open(&path).unwrap();
        store.write("kept", "1").unwrap();

        // A directory at the target path makes the rename fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(store.write("k", "v"), Err(StorageError::Io { .. })));
        assert!(store.read("k").unwrap().is_none());
        assert!(store.remove("kept").is_err());
        assert_eq!(store.read("kept").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["kept"]);
    }
}
