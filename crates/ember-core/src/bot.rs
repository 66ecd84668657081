//! The central runtime object.
//!
//! A [`Bot`] is built around a chat [`Backend`] and then receives, in order,
//! a storage plugin, a repo manager and an extension manager. Each slot can be
//! filled exactly once.
//!
//! ```text
//! Bot::new ──► attach_storage_plugin ──► attach_repo_manager
//!                                   └──► attach_extension_manager
//!          ──► initialize_backend_storage ──► serve_forever / close_storage
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use crate::extension::{
    ExtensionConstructor, ExtensionContext, ExtensionFactory, ExtensionLoadReport,
    ExtensionManager,
};
use crate::repo::RepoManager;
use crate::storage::{CORE_NAMESPACE, Storage, StoragePlugin};

const STORAGE_SLOT: &str = "storage plugin";
const REPO_SLOT: &str = "repo manager";
const EXTENSION_SLOT: &str = "extension manager";
const CORE_STORE_SLOT: &str = "core storage";

/// The wired bot instance.
pub struct Bot {
    config: Arc<BotConfig>,
    backend: Box<dyn Backend>,
    storage_plugin: OnceLock<Arc<dyn StoragePlugin>>,
    repo_manager: OnceLock<Arc<dyn RepoManager>>,
    extension_manager: OnceLock<Arc<dyn ExtensionManager>>,
    store: OnceLock<Arc<dyn Storage>>,
    startup_errors: RwLock<Option<String>>,
    storage_closed: AtomicBool,
}

impl Bot {
    /// Creates a bot around `backend` with no collaborators attached.
    pub fn new(config: Arc<BotConfig>, backend: Box<dyn Backend>) -> Arc<Self> {
        debug!(backend = %backend.mode(), "Bot created");
        Arc::new(Self {
            config,
            backend,
            storage_plugin: OnceLock::new(),
            repo_manager: OnceLock::new(),
            extension_manager: OnceLock::new(),
            store: OnceLock::new(),
            startup_errors: RwLock::new(None),
            storage_closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Arc<BotConfig> {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    // ─── Attachment ──────────────────────────────────────────────────────────

    /// Attaches the storage plugin. Must come before any manager.
    pub fn attach_storage_plugin(&self, plugin: Arc<dyn StoragePlugin>) -> BotResult<()> {
        self.storage_plugin
            .set(plugin)
            .map_err(|_| BotError::AlreadyAttached { slot: STORAGE_SLOT })?;
        debug!("Storage plugin attached");
        Ok(())
    }

    pub fn attach_repo_manager(&self, manager: Arc<dyn RepoManager>) -> BotResult<()> {
        self.require_storage(REPO_SLOT)?;
        self.repo_manager
            .set(manager)
            .map_err(|_| BotError::AlreadyAttached { slot: REPO_SLOT })?;
        debug!("Repo manager attached");
        Ok(())
    }

    pub fn attach_extension_manager(&self, manager: Arc<dyn ExtensionManager>) -> BotResult<()> {
        self.require_storage(EXTENSION_SLOT)?;
        self.extension_manager
            .set(manager)
            .map_err(|_| BotError::AlreadyAttached {
                slot: EXTENSION_SLOT,
            })?;
        debug!("Extension manager attached");
        Ok(())
    }

    fn require_storage(&self, slot: &'static str) -> BotResult<()> {
        if self.storage_plugin.get().is_none() {
            return Err(BotError::OutOfOrder {
                slot,
                requires: STORAGE_SLOT,
            });
        }
        Ok(())
    }

    pub fn storage_plugin(&self) -> BotResult<&Arc<dyn StoragePlugin>> {
        self.storage_plugin
            .get()
            .ok_or(BotError::NotAttached { slot: STORAGE_SLOT })
    }

    pub fn repo_manager(&self) -> BotResult<&Arc<dyn RepoManager>> {
        self.repo_manager
            .get()
            .ok_or(BotError::NotAttached { slot: REPO_SLOT })
    }

    pub fn extension_manager(&self) -> BotResult<&Arc<dyn ExtensionManager>> {
        self.extension_manager.get().ok_or(BotError::NotAttached {
            slot: EXTENSION_SLOT,
        })
    }

    /// Returns a factory that builds extensions bound to this bot.
    ///
    /// The factory holds a weak reference, so handing it to the extension
    /// manager does not keep the bot alive.
    pub fn extension_factory(self: &Arc<Self>) -> ExtensionFactory {
        let bot = Arc::downgrade(self);
        Arc::new(move |name: &str, create: ExtensionConstructor| {
            create(ExtensionContext::new(name, bot.clone()))
        })
    }

    // ─── Storage ─────────────────────────────────────────────────────────────

    /// Opens the bot's own `"core"` store and hands it to the backend.
    pub fn initialize_backend_storage(&self) -> BotResult<()> {
        let store = self.storage_plugin()?.open(CORE_NAMESPACE)?;
        self.backend.init_storage(store.as_ref())?;
        self.store.set(store).map_err(|_| BotError::AlreadyAttached {
            slot: CORE_STORE_SLOT,
        })?;
        info!(backend = %self.backend.mode(), "Backend storage initialized");
        Ok(())
    }

    /// The bot's own store. Available after
    /// [`initialize_backend_storage`](Self::initialize_backend_storage).
    pub fn store(&self) -> BotResult<&Arc<dyn Storage>> {
        self.store.get().ok_or(BotError::NotAttached {
            slot: CORE_STORE_SLOT,
        })
    }

    pub fn set_core_value(&self, key: &str, value: Value) -> BotResult<()> {
        self.store()?.set(key, value)?;
        Ok(())
    }

    pub fn core_value(&self, key: &str) -> BotResult<Option<Value>> {
        Ok(self.store()?.get(key)?)
    }

    /// Whether the repo manager already holds repository state.
    pub fn has_repository_state(&self) -> BotResult<bool> {
        Ok(self.repo_manager()?.has_repos()?)
    }

    /// Closes the storage plugin. Only the first call has any effect.
    pub fn close_storage(&self) -> BotResult<()> {
        let plugin = self.storage_plugin()?;
        if self.storage_closed.swap(true, Ordering::SeqCst) {
            debug!("Storage already closed");
            return Ok(());
        }
        plugin.close()?;
        info!("Storage closed");
        Ok(())
    }

    pub fn is_storage_closed(&self) -> bool {
        self.storage_closed.load(Ordering::SeqCst)
    }

    // ─── Extensions ──────────────────────────────────────────────────────────

    /// Loads extensions from every installed repository path.
    pub async fn load_extensions(&self) -> BotResult<ExtensionLoadReport> {
        let paths: Vec<PathBuf> = self.repo_manager()?.all_repo_paths()?;
        let report = self
            .extension_manager()?
            .update_extension_places(&paths)
            .await;
        if !report.is_clean() {
            warn!(
                failed = report.errors.len(),
                loaded = report.loaded.len(),
                "Some extensions failed to load"
            );
        }
        Ok(report)
    }

    /// Records the joined extension-load error text.
    pub fn record_startup_errors(&self, text: impl Into<String>) {
        *self.startup_errors.write() = Some(text.into());
    }

    pub fn startup_errors(&self) -> Option<String> {
        self.startup_errors.read().clone()
    }

    // ─── Serving ─────────────────────────────────────────────────────────────

    /// Runs the backend's serve loop, then deactivates extensions.
    pub async fn serve_forever(self: Arc<Self>) -> BotResult<()> {
        info!(backend = %self.backend.mode(), "Serving");
        let served = self
            .backend
            .serve_forever(Arc::clone(&self))
            .await
            .map_err(BotError::Backend);
        if let Some(manager) = self.extension_manager.get() {
            manager.deactivate_all().await;
        }
        served
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("backend", &self.backend.mode())
            .field("storage_attached", &self.storage_plugin.get().is_some())
            .field("repo_manager_attached", &self.repo_manager.get().is_some())
            .field(
                "extension_manager_attached",
                &self.extension_manager.get().is_some(),
            )
            .field("storage_closed", &self.is_storage_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{RawConfig, normalize};
    use crate::error::{BoxError, StorageError, StorageResult};
    use crate::extension::Extension;
    use crate::repo::RepoEntry;

    struct QuietBackend;

    #[async_trait]
    impl Backend for QuietBackend {
        fn mode(&self) -> &str {
            "quiet"
        }

        async fn serve_forever(&self, _bot: Arc<Bot>) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapStore {
        values: RwLock<HashMap<String, Value>>,
    }

    impl Storage for MapStore {
        fn namespace(&self) -> &str {
            CORE_NAMESPACE
        }

        fn get(&self, key: &str) -> StorageResult<Option<Value>> {
            Ok(self.values.read().get(key).cloned())
        }

        fn set(&self, key: &str, value: Value) -> StorageResult<()> {
            self.values.write().insert(key.to_string(), value);
            Ok(())
        }

        fn remove(&self, key: &str) -> StorageResult<Option<Value>> {
            Ok(self.values.write().remove(key))
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            let mut keys: Vec<_> = self.values.read().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }

        fn close(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPlugin {
        closes: AtomicUsize,
    }

    impl StoragePlugin for CountingPlugin {
        fn open(&self, _namespace: &str) -> StorageResult<Arc<dyn Storage>> {
            Ok(Arc::new(MapStore::default()))
        }

        fn close(&self) -> StorageResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedRepos(bool);

    impl RepoManager for FixedRepos {
        fn all_repo_paths(&self) -> StorageResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        fn has_repos(&self) -> StorageResult<bool> {
            Ok(self.0)
        }

        fn set_repos(&self, _repos: BTreeMap<String, RepoEntry>) -> StorageResult<()> {
            Err(StorageError::custom("read-only"))
        }

        fn add_repo(&self, _name: &str, _entry: RepoEntry) -> StorageResult<()> {
            Err(StorageError::custom("read-only"))
        }

        fn indexes(&self) -> &[String] {
            &[]
        }
    }

    fn bot() -> Arc<Bot> {
        let config = normalize(RawConfig {
            admins: Some(vec!["@admin".into()]),
            ..Default::default()
        })
        .unwrap();
        Bot::new(Arc::new(config), Box::new(QuietBackend))
    }

    #[test]
    fn test_repo_manager_requires_storage_first() {
        let bot = bot();
        let err = bot
            .attach_repo_manager(Arc::new(FixedRepos(false)))
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::OutOfOrder {
                slot: "repo manager",
                ..
            }
        ));
    }

    #[test]
    fn test_slots_are_write_once() {
        let bot = bot();
        bot.attach_storage_plugin(Arc::new(CountingPlugin::default()))
            .unwrap();
        let err = bot
            .attach_storage_plugin(Arc::new(CountingPlugin::default()))
            .unwrap_err();
        assert!(matches!(err, BotError::AlreadyAttached { .. }));

        bot.attach_repo_manager(Arc::new(FixedRepos(true))).unwrap();
        assert!(bot.attach_repo_manager(Arc::new(FixedRepos(true))).is_err());
        assert!(bot.has_repository_state().unwrap());
    }

    #[test]
    fn test_core_store_round_trip() {
        let bot = bot();
        assert!(matches!(bot.store(), Err(BotError::NotAttached { .. })));

        bot.attach_storage_plugin(Arc::new(CountingPlugin::default()))
            .unwrap();
        bot.initialize_backend_storage().unwrap();
        bot.set_core_value("greeting", Value::from("hi")).unwrap();
        assert_eq!(
            bot.core_value("greeting").unwrap(),
            Some(Value::from("hi"))
        );
    }

    #[test]
    fn test_close_storage_closes_once() {
        let bot = bot();
        let plugin = Arc::new(CountingPlugin::default());
        bot.attach_storage_plugin(plugin.clone()).unwrap();

        bot.close_storage().unwrap();
        bot.close_storage().unwrap();

        assert!(bot.is_storage_closed());
        assert_eq!(plugin.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_startup_errors_recorded() {
        let bot = bot();
        assert_eq!(bot.startup_errors(), None);
        bot.record_startup_errors("Echo failed");
        assert_eq!(bot.startup_errors().as_deref(), Some("Echo failed"));
    }

    struct Named(String);

    impl Extension for Named {
        fn name(&self) -> &str {
            &self.0
        }
    }

    fn named(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        assert!(ctx.bot().is_some());
        Ok(Box::new(Named(ctx.name().to_string())))
    }

    #[test]
    fn test_extension_factory_binds_bot_weakly() {
        let bot = bot();
        let factory = bot.extension_factory();

        let ext = factory("Echo", named).unwrap();
        assert_eq!(ext.name(), "Echo");

        drop(bot);
        assert!(factory("Echo", detached).is_ok());
    }

    fn detached(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        assert!(ctx.bot().is_none());
        Ok(Box::new(Named(ctx.name().to_string())))
    }

    #[tokio::test]
    async fn test_serve_forever_delegates_to_backend() {
        let bot = bot();
        bot.serve_forever().await.unwrap();
    }

    #[derive(Default)]
    struct ShutdownWatcher {
        deactivations: AtomicUsize,
    }

    #[async_trait]
    impl ExtensionManager for ShutdownWatcher {
        async fn update_extension_places(&self, _paths: &[PathBuf]) -> ExtensionLoadReport {
            ExtensionLoadReport::default()
        }

        fn loaded_extensions(&self) -> Vec<String> {
            Vec::new()
        }

        fn set_extension_config(&self, _extension: &str, _config: Value) -> StorageResult<()> {
            Ok(())
        }

        fn set_extension_value(
            &self,
            _extension: &str,
            _key: &str,
            _value: Value,
        ) -> StorageResult<()> {
            Ok(())
        }

        async fn deactivate_all(&self) {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_serve_forever_deactivates_extensions_on_return() {
        let bot = bot();
        let watcher = Arc::new(ShutdownWatcher::default());
        bot.attach_storage_plugin(Arc::new(CountingPlugin::default()))
            .unwrap();
        bot.attach_extension_manager(watcher.clone()).unwrap();

        bot.serve_forever().await.unwrap();

        assert_eq!(watcher.deactivations.load(Ordering::SeqCst), 1);
    }
}
