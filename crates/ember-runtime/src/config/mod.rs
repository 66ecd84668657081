//! Configuration loading for the Ember runtime.
//!
//! Sources are merged with figment into a [`RawConfig`](ember_core::RawConfig),
//! which [`ember_core::normalize`] then turns into the complete record.

pub mod error;
pub mod loader;

pub use error::{LoaderError, LoaderResult};
pub use loader::ConfigLoader;
