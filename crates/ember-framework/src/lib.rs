//! # Ember Framework
//!
//! Concrete building blocks for the Ember bot host.
//!
//! This layer provides:
//! - Plugin resolution across compiled-in modules and `.plug` manifests
//! - Built-in storage plugins (`File`, `Memory`) and backends (`Text`, `Null`)
//! - Core extensions
//! - The default repo manager and extension manager
//!
//! The bootstrap sequence that wires these together lives in `ember-runtime`.

pub mod error;
pub mod manager;
pub mod plugin;
pub mod repo;

pub use error::{PluginError, PluginResult};
pub use manager::{DefaultExtensionManager, extension_namespace};
pub use plugin::{
    BackendCapability, Capability, ModuleTable, PluginCapability, PluginDescriptor, PluginFactory,
    PluginInfo, PluginManifest, PluginResolver, PluginSource, Resolved, StorageCapability,
};
pub use repo::StoredRepoManager;
