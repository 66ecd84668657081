//! Error types for plugin resolution.

use std::path::PathBuf;

use ember_core::BoxError;
use thiserror::Error;

use crate::plugin::Capability;

/// Errors raised while resolving or constructing a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No search root defines the name.
    #[error("{capability} plugin '{name}' not found (searched: {searched})")]
    NotFound {
        name: String,
        capability: Capability,
        /// Human-readable list of the roots that were searched.
        searched: String,
    },

    /// The name exists but provides a different capability.
    #[error("plugin '{name}' provides {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: Capability,
        found: Capability,
    },

    /// A manifest points at a module no compiled-in plugin implements.
    #[error("plugin '{name}' uses unknown module '{module}'")]
    UnknownModule { name: String, module: String },

    /// More than one plugin with the same name inside a single root.
    #[error("plugin '{name}' is defined more than once in {root}")]
    Ambiguous { name: String, root: String },

    /// A `.plug` manifest could not be read or parsed.
    #[error("invalid plugin manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// The plugin factory failed.
    #[error("failed to construct plugin '{name}': {source}")]
    Construct {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl PluginError {
    pub fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for plugin resolution.
pub type PluginResult<T> = Result<T, PluginError>;
