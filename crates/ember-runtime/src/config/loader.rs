//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML configuration files (`ember.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`ember.yaml`, `ember.yml`, ...)
//!
//! # Source Priority (lowest to highest)
//!
//! 1. Configuration file, found in the search paths or given explicitly
//! 2. Environment variables (`EMBER_*`)
//! 3. Programmatic overrides ([`ConfigLoader::set`])
//!
//! Unset options stay unset here; defaults are applied by
//! [`ember_core::normalize`].
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `EMBER_` prefix with `__` as separator:
//!
//! - `EMBER_BACKEND=Null` → `backend = "Null"`
//! - `EMBER_LOG__LEVEL=debug` → `log.level = "debug"`
//! - `EMBER_ADMINS=[alice,bob]` → `admins = ["alice", "bob"]`
//!
//! # Example
//!
//! ```rust,ignore
//! use ember_runtime::config::ConfigLoader;
//!
//! let raw = ConfigLoader::new()
//!     .file("./ember.toml")
//!     .set("backend", "Null")
//!     .load()?;
//! let config = ember_core::normalize(raw)?;
//! ```

use std::path::{Path, PathBuf};

use ember_core::RawConfig;
use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{LoaderError, LoaderResult};

/// Prefix of environment variables read by the loader.
pub const ENV_PREFIX: &str = "EMBER_";

/// Directory name used under the user configuration directory.
const APP_DIR: &str = "ember";

/// Layered configuration loader.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Figment::new(),
        }
    }

    /// Adds a search path for configuration files.
    ///
    /// When no search path is added, the current directory and the user
    /// configuration directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Overrides a single option. `key` may be dotted (`"log.level"`).
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the raw configuration.
    pub fn load(self) -> LoaderResult<RawConfig> {
        let figment = self.build_figment()?;
        let raw: RawConfig = figment.extract()?;
        debug!(
            admins = raw.admins.as_ref().map_or(0, Vec::len),
            backend = ?raw.backend,
            storage = ?raw.storage,
            "Configuration sources merged"
        );
        Ok(raw)
    }

    fn build_figment(self) -> LoaderResult<Figment> {
        let mut figment = Figment::new();

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(LoaderError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> LoaderResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => {
                let _ = figment;
                Err(LoaderError::UnsupportedFormat(ext.to_string()))
            }
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR));
        }
        paths
    }

    /// Candidate file names for every enabled format, in preference order.
    #[allow(unused_mut)]
    fn candidate_names() -> Vec<&'static str> {
        let mut names = Vec::new();
        #[cfg(feature = "toml-config")]
        names.extend(["ember.toml", "config.toml"]);
        #[cfg(feature = "yaml-config")]
        names.extend(["ember.yaml", "ember.yml", "config.yaml", "config.yml"]);
        names
    }

    /// Merges the first configuration file found in the search paths.
    fn load_config_files(&self, figment: Figment) -> Figment {
        let names = Self::candidate_names();
        for search_path in self.resolve_search_paths() {
            for name in &names {
                let path = search_path.join(name);
                if path.is_file() {
                    info!(path = %path.display(), "Loading configuration file");
                    // Only enabled formats are in `names`.
                    return Self::merge_config_file(figment.clone(), &path).unwrap_or(figment);
                }
            }
        }
        warn!("No configuration file found");
        figment
    }
}
