//! Plugin system.
//!
//! Storage plugins and chat backends are looked up by name:
//!
//! - A [`PluginDescriptor`] is the *static, `Copy` handle* to a compiled-in
//!   plugin. Its [`PluginFactory`] variant fixes its [`Capability`].
//! - A [`PluginManifest`] is the on-disk form (`*.plug`) found in extra
//!   search roots. It names a plugin and points at a compiled-in module.
//! - The [`PluginResolver`] searches the [`ModuleTable`] and the extra roots
//!   in [`SearchOrder`](ember_core::config::SearchOrder) and constructs the
//!   first match.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use ember_framework::plugin::{ModuleTable, PluginResolver, StorageCapability};
//!
//! let modules = ModuleTable::builtin();
//! let resolver = PluginResolver::new(
//!     &modules,
//!     config.extra_storage_dirs(),
//!     config.plugin_search_order,
//! );
//! let storage = resolver.resolve::<StorageCapability>(&config.storage, &config)?;
//! ```

pub mod builtin;
pub mod descriptor;
pub mod manifest;
pub mod registry;
pub mod resolver;

pub use descriptor::{
    BackendCapability, BackendFactory, Capability, PluginCapability, PluginDescriptor,
    PluginFactory, StorageCapability, StorageFactory,
};
pub use manifest::{
    ManifestCore, ManifestDocumentation, PluginManifest, find_manifests, load_manifests,
};
pub use registry::ModuleTable;
pub use resolver::{PluginInfo, PluginResolver, PluginSource, Resolved};
