//! Chat backend capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::Bot;
use crate::error::{BoxError, StorageResult};
use crate::storage::Storage;

/// A chat-network adapter the [`Bot`] is built around.
///
/// Backends are constructed from the configuration record alone. Wire
/// protocols live entirely behind this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier of the backend, e.g. `"text"`.
    fn mode(&self) -> &str;

    /// Called once the bot's core store is open.
    fn init_storage(&self, _store: &dyn Storage) -> StorageResult<()> {
        Ok(())
    }

    /// Runs the backend's serve loop until it decides to stop.
    async fn serve_forever(&self, bot: Arc<Bot>) -> Result<(), BoxError>;
}
