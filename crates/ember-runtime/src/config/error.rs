//! Configuration loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading configuration sources.
///
/// Semantic problems (missing `admins`, invalid values) are reported later by
/// [`ember_core::normalize`] as [`ember_core::ConfigError`].
#[derive(Error, Debug)]
pub enum LoaderError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension is unknown or its format feature is disabled.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// The merged sources could not be extracted into a configuration.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for LoaderError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration loading.
pub type LoaderResult<T> = Result<T, LoaderError>;
