//! On-disk plugin manifests.
//!
//! Extra search roots contain `*.plug` files in TOML:
//!
//! ```toml
//! [core]
//! name = "Scratch"
//! module = "memory"
//! capability = "storage"
//! depends_on = []          # extensions only
//!
//! [documentation]
//! description = "Throwaway in-memory storage"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Toml};
use serde::Deserialize;

use super::Capability;
use crate::error::{PluginError, PluginResult};

/// File extension of plugin manifests.
pub const MANIFEST_EXTENSION: &str = "plug";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestCore {
    pub name: String,
    pub module: String,
    pub capability: Capability,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManifestDocumentation {
    pub description: String,
}

/// A parsed `.plug` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginManifest {
    pub core: ManifestCore,
    #[serde(default)]
    pub documentation: ManifestDocumentation,
}

impl PluginManifest {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: &Path) -> PluginResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| PluginError::manifest(path, e))?;
        Self::parse(path, &text)
    }

    /// Parses a manifest from a TOML string. `origin` is used in errors.
    pub fn parse(origin: &Path, toml: &str) -> PluginResult<Self> {
        Figment::from(Toml::string(toml))
            .extract()
            .map_err(|e| PluginError::manifest(origin, e))
    }
}

/// Finds every manifest under `root`, recursively, sorted by path.
///
/// A missing root yields no manifests.
pub fn find_manifests(root: &Path) -> PluginResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    if root.is_dir() {
        walk(root, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> PluginResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| PluginError::manifest(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| PluginError::manifest(dir, e))?.path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
            found.push(path);
        }
    }
    Ok(())
}

/// Loads every manifest under `root`.
pub fn load_manifests(root: &Path) -> PluginResult<Vec<(PathBuf, PluginManifest)>> {
    find_manifests(root)?
        .into_iter()
        .map(|path| PluginManifest::load(&path).map(|manifest| (path, manifest)))
        .collect()
}
