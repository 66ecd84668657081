//! Error types shared across the Ember crates.

use thiserror::Error;

/// Type-erased error returned by plugin and collaborator constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`Storage`](crate::storage::Storage) or
/// [`StoragePlugin`](crate::storage::StoragePlugin).
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store was used after `close`.
    #[error("storage namespace '{namespace}' is closed")]
    Closed { namespace: String },

    /// Reading or writing the backing medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other failure reported by a storage implementation.
    #[error("{0}")]
    Custom(String),
}

impl StorageError {
    /// Creates a custom storage error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the [`Bot`](crate::bot::Bot) runtime object.
#[derive(Error, Debug)]
pub enum BotError {
    /// A write-once slot was filled a second time.
    #[error("{slot} is already attached to the bot")]
    AlreadyAttached { slot: &'static str },

    /// A slot that an operation needs has not been filled yet.
    #[error("{slot} is not attached to the bot")]
    NotAttached { slot: &'static str },

    /// A slot was filled before the slot it depends on.
    #[error("cannot attach {slot} before {requires}")]
    OutOfOrder {
        slot: &'static str,
        requires: &'static str,
    },

    /// The backend failed while serving.
    #[error("backend error: {0}")]
    Backend(BoxError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for bot operations.
pub type BotResult<T> = Result<T, BotError>;
