//! # Ember Core
//!
//! Shared types for the Ember bot host.
//!
//! - **Configuration**: [`RawConfig`] as loaded, [`BotConfig`] after [`normalize`].
//! - **Capabilities**: [`StoragePlugin`] / [`Storage`], [`Backend`], [`Extension`].
//! - **Collaborators**: [`RepoManager`] and [`ExtensionManager`] interfaces.
//! - **Runtime object**: [`Bot`], the instance everything is attached to.
//!
//! Concrete plugins and managers live in `ember-framework`; the bootstrap
//! sequence lives in `ember-runtime`.

pub mod backend;
pub mod bot;
pub mod config;
pub mod error;
pub mod extension;
pub mod repo;
pub mod storage;

pub use backend::Backend;
pub use bot::Bot;
pub use config::{BotConfig, ConfigError, ConfigResult, RawConfig, normalize};
pub use error::{BotError, BotResult, BoxError, StorageError, StorageResult};
pub use extension::{
    CallbackOrder, Extension, ExtensionConstructor, ExtensionContext, ExtensionDescriptor,
    ExtensionFactory, ExtensionLoadReport, ExtensionManager, ExtensionManagerSettings, OrderSlot,
};
pub use repo::{RepoEntry, RepoManager, RepoManagerSettings};
pub use storage::{CORE_NAMESPACE, Storage, StoragePlugin};
