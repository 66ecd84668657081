//! Built-in plugins shipped with the framework.
//!
//! | Name | Capability | Module |
//! |------|------------|--------|
//! | [`FILE_STORAGE`] | storage | `file` |
//! | [`MEMORY_STORAGE`] | storage | `memory` |
//! | [`TEXT_BACKEND`] | backend | `text` |
//! | [`NULL_BACKEND`] | backend | `null` |
//!
//! Core extensions are listed in [`CORE_EXTENSIONS`].

pub mod backend;
pub mod extensions;
pub mod storage;

pub use backend::{NULL_BACKEND, NullBackend, TEXT_BACKEND, TextBackend};
pub use extensions::{HEALTH, HELP, UTILS};
pub use storage::{FILE_STORAGE, FileStorage, MEMORY_STORAGE, MemoryStorage};

use ember_core::ExtensionDescriptor;

use super::PluginDescriptor;

/// Every built-in storage plugin and backend.
pub static DESCRIPTORS: [PluginDescriptor; 4] =
    [FILE_STORAGE, MEMORY_STORAGE, TEXT_BACKEND, NULL_BACKEND];

/// Extensions compiled into the host.
pub static CORE_EXTENSIONS: [ExtensionDescriptor; 3] = [HEALTH, HELP, UTILS];
