//! # Ember
//!
//! A pluggable chat bot host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────────────────┐
//! │ ConfigLoader │────▶│ Bootstrap                     │
//! └──────────────┘     │  storage ─▶ backend ─▶ Bot    │
//!                      │  repo manager                 │──▶ Bot::serve_forever
//!                      │  extension manager            │
//!                      └───────────────────────────────┘
//! ```
//!
//! - **Storage plugins**: namespaced key-value persistence (`File`, `Memory`)
//! - **Backends**: the chat network a bot talks to (`Text`, `Null`)
//! - **Extensions**: independently loadable units of bot behaviour
//! - **Repo manager**: where installed extension repositories live
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ember::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let raw = ConfigLoader::new().load()?;
//!     match Bootstrap::new(raw).setup().await {
//!         BootstrapOutcome::Ready { bot, .. } => bot.serve_forever().await?,
//!         BootstrapOutcome::Restored { .. } => {}
//!         BootstrapOutcome::Failed(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON console logs
//! - `logstash`: ship logs to Logstash
//! - `sentry`: report errors and breadcrumbs to Sentry

pub use ember_core as core;
pub use ember_framework as framework;
pub use ember_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ember::prelude::*;
/// ```
pub mod prelude {
    // Startup
    pub use ember_runtime::{Bootstrap, BootstrapError, BootstrapOutcome, ConfigLoader};

    // Runtime object and configuration
    pub use ember_core::{Bot, BotConfig, RawConfig, normalize};

    // Capabilities for custom plugins
    pub use ember_core::{
        Backend, BoxError, Extension, ExtensionContext, ExtensionDescriptor, Storage,
        StoragePlugin,
    };

    // Plugin lookup
    pub use ember_framework::{ModuleTable, PluginDescriptor, PluginFactory};
}
