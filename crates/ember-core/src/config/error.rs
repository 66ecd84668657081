//! Configuration error types.

use thiserror::Error;

/// Errors raised while turning a raw configuration into a [`BotConfig`].
///
/// [`BotConfig`]: super::BotConfig
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option has no value and no default.
    #[error("{field} missing from configuration")]
    MissingField { field: &'static str },

    /// An option is present but its value is unusable.
    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
