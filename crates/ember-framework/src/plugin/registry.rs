//! The table of compiled-in plugin modules.
//!
//! A [`ModuleTable`] is both the core search root (matched by descriptor
//! name) and the set of implementations `.plug` manifests may point at
//! (matched by module key).
//!
//! ```rust,ignore
//! let modules = ModuleTable::builtin().with(REDIS_STORAGE);
//! ```

use super::builtin;
use super::{Capability, PluginDescriptor};

#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    descriptors: Vec<PluginDescriptor>,
}

impl ModuleTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins that ship with the framework.
    pub fn builtin() -> Self {
        Self {
            descriptors: builtin::DESCRIPTORS.to_vec(),
        }
    }

    /// Adds a descriptor.
    ///
    /// Entries are never replaced: registering a name twice makes resolving
    /// that name fail with [`PluginError::Ambiguous`](crate::PluginError::Ambiguous).
    pub fn with(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    /// Every descriptor named `name`, in registration order.
    pub fn named<'s>(&'s self, name: &str) -> impl Iterator<Item = &'s PluginDescriptor> {
        self.descriptors.iter().filter(move |d| d.name == name)
    }

    /// The implementation of `module` for `capability`, if any.
    pub fn module(&self, module: &str, capability: Capability) -> Option<&PluginDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.module == module && d.capability() == capability)
    }

    /// Whether any descriptor implements `module`, regardless of capability.
    pub fn has_module(&self, module: &str) -> bool {
        self.descriptors.iter().any(|d| d.module == module)
    }
}
