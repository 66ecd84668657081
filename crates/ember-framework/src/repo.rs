//! Default repo manager.
//!
//! Keeps the repository table in the `"repomgr"` storage namespace under the
//! `"repos"` key. Installed repositories live in the extension directory.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use ember_core::{RepoEntry, RepoManager, RepoManagerSettings, Storage, StorageResult};
use serde_json::Value;
use tracing::{debug, info};

/// Storage namespace owned by the repo manager.
pub const REPO_NAMESPACE: &str = "repomgr";

/// Key of the repository table inside [`REPO_NAMESPACE`].
pub const REPOS_KEY: &str = "repos";

pub struct StoredRepoManager {
    store: Arc<dyn Storage>,
    extension_dir: PathBuf,
    indexes: Vec<String>,
}

impl StoredRepoManager {
    pub fn new(settings: RepoManagerSettings) -> StorageResult<Self> {
        let store = settings.storage.open(REPO_NAMESPACE)?;
        debug!(
            extension_dir = %settings.extension_dir.display(),
            indexes = settings.plugin_indexes.len(),
            "Repo manager ready"
        );
        Ok(Self {
            store,
            extension_dir: settings.extension_dir,
            indexes: settings.plugin_indexes,
        })
    }

    /// The current repository table.
    pub fn repos(&self) -> StorageResult<BTreeMap<String, RepoEntry>> {
        match self.store.get(REPOS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn store_repos(&self, repos: &BTreeMap<String, RepoEntry>) -> StorageResult<()> {
        self.store.set(REPOS_KEY, serde_json::to_value(repos)?)
    }

    fn repo_path(&self, name: &str, entry: &RepoEntry) -> PathBuf {
        match &entry.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.extension_dir.join(path),
            None => self.extension_dir.join(name),
        }
    }
}

impl RepoManager for StoredRepoManager {
    fn all_repo_paths(&self) -> StorageResult<Vec<PathBuf>> {
        Ok(self
            .repos()?
            .iter()
            .map(|(name, entry)| self.repo_path(name, entry))
            .collect())
    }

    fn has_repos(&self) -> StorageResult<bool> {
        Ok(match self.store.get(REPOS_KEY)? {
            None => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        })
    }

    fn set_repos(&self, repos: BTreeMap<String, RepoEntry>) -> StorageResult<()> {
        self.store_repos(&repos)?;
        info!(count = repos.len(), "Repository table replaced");
        Ok(())
    }

    fn add_repo(&self, name: &str, entry: RepoEntry) -> StorageResult<()> {
        let mut repos = self.repos()?;
        repos.insert(name.to_string(), entry);
        self.store_repos(&repos)?;
        info!(repo = %name, "Repository added");
        Ok(())
    }

    fn indexes(&self) -> &[String] {
        &self.indexes
    }
}
