//! Plugin descriptors: static, `Copy` handles to compiled-in plugins.

use std::fmt;
use std::sync::Arc;

use ember_core::{Backend, BotConfig, BoxError, StoragePlugin};
use serde::{Deserialize, Serialize};

// ─── Capability ───────────────────────────────────────────────────────────────

/// The role a plugin plays for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Storage,
    Backend,
    Extension,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Backend => write!(f, "backend"),
            Self::Extension => write!(f, "extension"),
        }
    }
}

// ─── PluginFactory ────────────────────────────────────────────────────────────

pub type StorageFactory = fn(&BotConfig) -> Result<Arc<dyn StoragePlugin>, BoxError>;

/// Backends are built from the configuration record alone.
pub type BackendFactory = fn(&BotConfig) -> Result<Box<dyn Backend>, BoxError>;

/// Typed constructor. The variant determines the plugin's [`Capability`].
#[derive(Debug, Clone, Copy)]
pub enum PluginFactory {
    Storage(StorageFactory),
    Backend(BackendFactory),
}

impl PluginFactory {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Storage(_) => Capability::Storage,
            Self::Backend(_) => Capability::Backend,
        }
    }
}

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// A static, `Copy` descriptor that identifies and instantiates a plugin.
///
/// `name` is what configuration refers to; `module` is what `.plug`
/// manifests in extra search roots refer to.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub module: &'static str,
    pub description: &'static str,
    pub factory: PluginFactory,
}

impl PluginDescriptor {
    #[inline]
    pub fn capability(&self) -> Capability {
        self.factory.capability()
    }
}

// ─── PluginCapability ─────────────────────────────────────────────────────────

/// Links a [`Capability`] to the instance type its factories produce.
pub trait PluginCapability {
    const CAPABILITY: Capability;

    type Instance;

    /// Runs `factory` if it belongs to this capability.
    fn construct(
        factory: &PluginFactory,
        config: &BotConfig,
    ) -> Option<Result<Self::Instance, BoxError>>;
}

/// Marker for storage plugins.
#[derive(Debug)]
pub struct StorageCapability;

impl PluginCapability for StorageCapability {
    const CAPABILITY: Capability = Capability::Storage;

    type Instance = Arc<dyn StoragePlugin>;

    fn construct(
        factory: &PluginFactory,
        config: &BotConfig,
    ) -> Option<Result<Self::Instance, BoxError>> {
        match factory {
            PluginFactory::Storage(create) => Some(create(config)),
            _ => None,
        }
    }
}

/// Marker for chat backends.
#[derive(Debug)]
pub struct BackendCapability;

impl PluginCapability for BackendCapability {
    const CAPABILITY: Capability = Capability::Backend;

    type Instance = Box<dyn Backend>;

    fn construct(
        factory: &PluginFactory,
        config: &BotConfig,
    ) -> Option<Result<Self::Instance, BoxError>> {
        match factory {
            PluginFactory::Backend(create) => Some(create(config)),
            _ => None,
        }
    }
}
