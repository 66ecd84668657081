//! Built-in storage plugins.
//!
//! | Name | Module | Persistence |
//! |------|--------|-------------|
//! | `File` | `file` | One JSON document per namespace under `data_dir` |
//! | `Memory` | `memory` | None; data is dropped on close |
//!
//! `File` reads `storage_config.basedir` to override the directory:
//!
//! ```toml
//! storage = "File"
//! [storage_config]
//! basedir = "/var/lib/ember/store"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_core::{BotConfig, BoxError, Storage, StorageError, StoragePlugin, StorageResult};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, trace};

use crate::plugin::{PluginDescriptor, PluginFactory};

pub const FILE_STORAGE: PluginDescriptor = PluginDescriptor {
    name: "File",
    module: "file",
    description: "Persists each namespace as a JSON file in the data directory",
    factory: PluginFactory::Storage(FileStorage::create),
};

pub const MEMORY_STORAGE: PluginDescriptor = PluginDescriptor {
    name: "Memory",
    module: "memory",
    description: "Keeps every namespace in memory until closed",
    factory: PluginFactory::Storage(MemoryStorage::create),
};

// ─── KeyValueStore ────────────────────────────────────────────────────────────

/// A namespace's values, optionally written through to a file.
struct KeyValueStore {
    namespace: String,
    file: Option<PathBuf>,
    values: RwLock<BTreeMap<String, Value>>,
    closed: AtomicBool,
}

impl KeyValueStore {
    fn in_memory(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            file: None,
            values: RwLock::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn from_file(namespace: &str, path: PathBuf) -> StorageResult<Self> {
        let values = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            namespace: namespace.to_string(),
            file: Some(path),
            values: RwLock::new(values),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed {
                namespace: self.namespace.clone(),
            });
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> StorageResult<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        atomic_write(path, &serde_json::to_vec_pretty(values)?)?;
        trace!(namespace = %self.namespace, path = %path.display(), "Namespace flushed");
        Ok(())
    }
}

impl Storage for KeyValueStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.ensure_open()?;
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> StorageResult<Option<Value>> {
        self.ensure_open()?;
        let mut values = self.values.write();
        let previous = values.remove(key);
        if previous.is_some() {
            self.flush(&values)?;
        }
        Ok(previous)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.values.read().keys().cloned().collect())
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush(&self.values.read())
    }
}

/// Writes `contents` to a sibling temp file, then renames it over `path`.
fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn check_namespace(namespace: &str) -> StorageResult<()> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !namespace.starts_with('.');
    if !valid {
        return Err(StorageError::custom(format!(
            "invalid storage namespace '{namespace}'"
        )));
    }
    Ok(())
}

/// Open stores keyed by namespace.
#[derive(Default)]
struct OpenStores(Mutex<HashMap<String, Arc<KeyValueStore>>>);

impl OpenStores {
    fn get_or_open(
        &self,
        namespace: &str,
        open: impl FnOnce() -> StorageResult<KeyValueStore>,
    ) -> StorageResult<Arc<dyn Storage>> {
        check_namespace(namespace)?;
        let mut stores = self.0.lock();
        if let Some(store) = stores.get(namespace).filter(|s| !s.is_closed()) {
            return Ok(Arc::clone(store) as Arc<dyn Storage>);
        }
        let store = Arc::new(open()?);
        stores.insert(namespace.to_string(), Arc::clone(&store));
        debug!(namespace = %namespace, "Storage namespace opened");
        Ok(store as Arc<dyn Storage>)
    }

    fn close_all(&self) -> StorageResult<()> {
        let stores: Vec<_> = self.0.lock().drain().map(|(_, s)| s).collect();
        for store in stores {
            store.close()?;
        }
        Ok(())
    }
}

// ─── FileStorage ──────────────────────────────────────────────────────────────

/// Stores every namespace in `<dir>/<namespace>.json`.
pub struct FileStorage {
    dir: PathBuf,
    stores: OpenStores,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stores: OpenStores::default(),
        }
    }

    fn create(config: &BotConfig) -> Result<Arc<dyn StoragePlugin>, BoxError> {
        let dir = match config.storage_config.get("basedir") {
            None => config.data_dir.clone(),
            Some(Value::String(dir)) => PathBuf::from(dir),
            Some(other) => {
                return Err(format!("storage_config.basedir must be a string, got {other}").into());
            }
        };
        Ok(Arc::new(Self::new(dir)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StoragePlugin for FileStorage {
    fn open(&self, namespace: &str) -> StorageResult<Arc<dyn Storage>> {
        self.stores.get_or_open(namespace, || {
            fs::create_dir_all(&self.dir)?;
            KeyValueStore::from_file(namespace, self.dir.join(format!("{namespace}.json")))
        })
    }

    fn close(&self) -> StorageResult<()> {
        self.stores.close_all()
    }
}

// ─── MemoryStorage ────────────────────────────────────────────────────────────

/// Keeps namespaces in memory. Reopening a namespace before `close` returns
/// the same data.
#[derive(Default)]
pub struct MemoryStorage {
    stores: OpenStores,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(_config: &BotConfig) -> Result<Arc<dyn StoragePlugin>, BoxError> {
        Ok(Arc::new(Self::new()))
    }
}

impl StoragePlugin for MemoryStorage {
    fn open(&self, namespace: &str) -> StorageResult<Arc<dyn Storage>> {
        self.stores
            .get_or_open(namespace, || Ok(KeyValueStore::in_memory(namespace)))
    }

    fn close(&self) -> StorageResult<()> {
        self.stores.close_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let storage = FileStorage::new(dir.path());
        let store = storage.open("core").unwrap();
        store.set("answer", Value::from(42)).unwrap();
        storage.close().unwrap();

        assert!(dir.path().join("core.json").is_file());

        let reopened = FileStorage::new(dir.path());
        let store = reopened.open("core").unwrap();
        assert_eq!(store.get("answer").unwrap(), Some(Value::from(42)));
        assert_eq!(store.keys().unwrap(), vec!["answer"]);
    }

    #[test]
    fn test_closed_store_rejects_access() {
        let storage = MemoryStorage::new();
        let store = storage.open("core").unwrap();
        storage.close().unwrap();

        assert!(matches!(
            store.get("anything"),
            Err(StorageError::Closed { .. })
        ));
    }

    #[test]
    fn test_memory_storage_shares_open_namespace() {
        let storage = MemoryStorage::new();
        storage
            .open("repomgr")
            .unwrap()
            .set("repos", Value::from("x"))
            .unwrap();
        assert!(storage.open("repomgr").unwrap().contains("repos").unwrap());
        assert!(!storage.open("core").unwrap().contains("repos").unwrap());
    }

    #[test]
    fn test_remove_returns_previous() {
        let storage = MemoryStorage::new();
        let store = storage.open("core").unwrap();
        store.set("k", Value::Bool(true)).unwrap();
        assert_eq!(store.remove("k").unwrap(), Some(Value::Bool(true)));
        assert_eq!(store.remove("k").unwrap(), None);
    }

    #[test]
    fn test_namespace_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.open("../outside").is_err());
        assert!(storage.open("").is_err());
    }
}
