//! Ember Runtime - startup orchestration for the Ember bot host.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - The bootstrap sequence (`Bootstrap`) that wires storage, backend, repo
//!   manager and extension manager into a ready `Bot`
//! - Restore scripts replayed onto a fresh bot (`restore`)
//!
//! ```ignore
//! use ember_runtime::{Bootstrap, BootstrapOutcome, ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let raw = ConfigLoader::new().load()?;
//!     match Bootstrap::new(raw).setup().await {
//!         BootstrapOutcome::Ready { bot, .. } => bot.serve_forever().await?,
//!         BootstrapOutcome::Restored { operations } => println!("{operations} ops restored"),
//!         BootstrapOutcome::Failed(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: the `json` console log format
//! - `logstash`: the Logstash log sink
//! - `sentry`: the Sentry log sink

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod restore;

// Re-exports
pub use bootstrap::{
    Bootstrap, BootstrapError, BootstrapOutcome, ExtensionManagerConstructor,
    RepoManagerConstructor, get_storage_plugin, prepare_extension_dir, setup_backend,
};
pub use config::{ConfigLoader, LoaderError, LoaderResult};
pub use logging::{LoggingBuilder, TelemetryError};
pub use restore::{RestoreError, RestoreOp, RestoreResult, RestoreScript, restore_from_file};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
