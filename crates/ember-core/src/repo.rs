//! Repo manager interface.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageResult;
use crate::storage::StoragePlugin;

/// One installed extension repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoEntry {
    /// Where the repository was fetched from.
    pub url: Option<String>,
    /// Checkout location. Relative paths are resolved against the extension
    /// directory; when absent the repo name is used.
    pub path: Option<PathBuf>,
    pub documentation: Option<String>,
    /// Fields the host does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tracks installed extension repositories and the indexes they come from.
pub trait RepoManager: Send + Sync {
    /// Filesystem location of every installed repository.
    fn all_repo_paths(&self) -> StorageResult<Vec<PathBuf>>;

    /// Whether any repository state has been recorded.
    fn has_repos(&self) -> StorageResult<bool>;

    /// Replaces the whole repository table.
    fn set_repos(&self, repos: BTreeMap<String, RepoEntry>) -> StorageResult<()>;

    /// Adds or replaces one repository.
    fn add_repo(&self, name: &str, entry: RepoEntry) -> StorageResult<()>;

    /// Plugin index locations this manager consults.
    fn indexes(&self) -> &[String];
}

/// Everything a repo manager is constructed from.
#[derive(Clone)]
pub struct RepoManagerSettings {
    pub storage: Arc<dyn StoragePlugin>,
    pub extension_dir: PathBuf,
    pub plugin_indexes: Vec<String>,
}
