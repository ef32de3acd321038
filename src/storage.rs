use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::errors::{AppError, AppResult};

/// Host key-value storage capability.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
    async fn remove(&self, key: &str) -> AppResult<()>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut map = store.entries.lock();
            for (key, value) in entries {
                map.insert(key.into(), value.into());
            }
        }
        store
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Key-value store persisted as one pretty-printed JSON object on disk.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(store_path(data_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AppResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => Ok(entries),
                Err(err) => {
                    warn!(
                        target: "storage",
                        error = ?err,
                        path = %self.path.display(),
                        "failed to parse store file; starting empty"
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _lock = self.guard.lock();
        Ok(self.load()?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _lock = self.guard.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let _lock = self.guard.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("storage.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        assert_eq!(store.get("pinned_objects").await.unwrap(), None);

        store.set("pinned_objects", "[]").await.unwrap();
        let reopened = JsonFileStore::in_dir(dir.path());
        assert_eq!(
            reopened.get("pinned_objects").await.unwrap().as_deref(),
            Some("[]")
        );

        reopened.remove("pinned_objects").await.unwrap();
        assert_eq!(store.get("pinned_objects").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_store_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = store_path(dir.path());
        fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get("anything").await.unwrap(), None);
        store.set("anything", "value").await.unwrap();
        assert_eq!(store.get("anything").await.unwrap().as_deref(), Some("value"));
    }
}
