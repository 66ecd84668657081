//! Persistence capability.
//!
//! A [`StoragePlugin`] hands out one [`Storage`] per namespace. The bot opens
//! `"core"` for itself; the repo and extension managers open their own.

use std::sync::Arc;

use serde_json::Value;

use crate::error::StorageResult;

/// Namespace used by the bot for its own state.
pub const CORE_NAMESPACE: &str = "core";

/// A key/value store scoped to a single namespace.
pub trait Storage: Send + Sync {
    /// Namespace this store was opened for.
    fn namespace(&self) -> &str;

    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Removes `key`, returning the previous value if any.
    fn remove(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Returns every key, sorted.
    fn keys(&self) -> StorageResult<Vec<String>>;

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Flushes and releases the store. Further access fails with
    /// [`StorageError::Closed`](crate::error::StorageError::Closed).
    fn close(&self) -> StorageResult<()>;
}

/// A persistence provider the bot is attached to.
pub trait StoragePlugin: Send + Sync {
    /// Opens (or reopens) the store for `namespace`.
    fn open(&self, namespace: &str) -> StorageResult<Arc<dyn Storage>>;

    /// Closes every store handed out by this plugin.
    fn close(&self) -> StorageResult<()>;
}
