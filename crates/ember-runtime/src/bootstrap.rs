//! Bootstrap orchestration.
//!
//! [`Bootstrap::setup`] turns a raw configuration into a ready [`Bot`]:
//!
//! ```text
//! normalize ─► logging ─► storage ─► extension dir ─► backend + Bot
//!     ─► repo manager ─► extension manager ─► attach (storage first)
//!     ─► backend storage ─► restore? ─► load extensions ─► Ready
//! ```
//!
//! Every step before extension loading is fatal. Per-extension load failures
//! are recorded on the bot and do not stop startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ember_core::{
    Bot, BotConfig, BotError, BoxError, ConfigError, ExtensionLoadReport, ExtensionManager,
    ExtensionManagerSettings, RawConfig, RepoManager, RepoManagerSettings, StorageError,
    StoragePlugin, normalize,
};
use ember_framework::{
    BackendCapability, DefaultExtensionManager, ModuleTable, PluginError, PluginResolver,
    Resolved, StorageCapability, StoredRepoManager,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::logging::{self, TelemetryError};
use crate::restore::{RestoreError, restore_from_file};

/// Errors that abort bootstrap.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Bot(#[from] BotError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to prepare extension directory {path}")]
    ExtensionDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to construct repo manager: {0}")]
    RepoManager(#[source] BoxError),

    #[error("failed to construct extension manager: {0}")]
    ExtensionManager(#[source] BoxError),

    /// A restore was requested for a bot that already has repository state.
    #[error("refusing to restore: the bot already has installed repositories")]
    RestorePrecondition,

    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// How bootstrap ended.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The bot is wired and extensions are loaded.
    Ready {
        bot: Arc<Bot>,
        report: ExtensionLoadReport,
    },
    /// A restore script was replayed; the bot is not meant to serve.
    Restored { operations: usize },
    Failed(BootstrapError),
}

impl BootstrapOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Ready { .. } | Self::Restored { .. } => 0,
            Self::Failed(_) => 1,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Builds the repo manager during bootstrap.
pub type RepoManagerConstructor =
    Box<dyn FnOnce(RepoManagerSettings) -> Result<Arc<dyn RepoManager>, BoxError> + Send>;

/// Builds the extension manager during bootstrap.
pub type ExtensionManagerConstructor = Box<
    dyn FnOnce(ExtensionManagerSettings) -> Result<Arc<dyn ExtensionManager>, BoxError> + Send,
>;

fn default_repo_manager(settings: RepoManagerSettings) -> Result<Arc<dyn RepoManager>, BoxError> {
    let manager: Arc<dyn RepoManager> = Arc::new(StoredRepoManager::new(settings)?);
    Ok(manager)
}

fn default_extension_manager(
    settings: ExtensionManagerSettings,
) -> Result<Arc<dyn ExtensionManager>, BoxError> {
    let manager: Arc<dyn ExtensionManager> = Arc::new(DefaultExtensionManager::new(settings)?);
    Ok(manager)
}

/// Startup builder.
///
/// # Example
///
/// ```rust,ignore
/// let outcome = Bootstrap::new(raw).backend("Null").setup().await;
/// if let BootstrapOutcome::Ready { bot, .. } = outcome {
///     bot.serve_forever().await?;
/// }
/// ```
pub struct Bootstrap {
    raw: RawConfig,
    modules: ModuleTable,
    backend: Option<String>,
    restore: Option<PathBuf>,
    repo_manager: RepoManagerConstructor,
    extension_manager: ExtensionManagerConstructor,
}

impl Bootstrap {
    pub fn new(raw: RawConfig) -> Self {
        Self {
            raw,
            modules: ModuleTable::builtin(),
            backend: None,
            restore: None,
            repo_manager: Box::new(default_repo_manager),
            extension_manager: Box::new(default_extension_manager),
        }
    }

    /// Replaces the compiled-in plugin table.
    pub fn modules(mut self, modules: ModuleTable) -> Self {
        self.modules = modules;
        self
    }

    /// Uses `name` instead of the configured backend.
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    /// Replays the script at `path` instead of loading extensions.
    pub fn restore(mut self, path: impl Into<PathBuf>) -> Self {
        self.restore = Some(path.into());
        self
    }

    pub fn repo_manager_with<F>(mut self, constructor: F) -> Self
    where
        F: FnOnce(RepoManagerSettings) -> Result<Arc<dyn RepoManager>, BoxError> + Send + 'static,
    {
        self.repo_manager = Box::new(constructor);
        self
    }

    pub fn extension_manager_with<F>(mut self, constructor: F) -> Self
    where
        F: FnOnce(ExtensionManagerSettings) -> Result<Arc<dyn ExtensionManager>, BoxError>
            + Send
            + 'static,
    {
        self.extension_manager = Box::new(constructor);
        self
    }

    /// Runs the startup sequence.
    pub async fn setup(self) -> BootstrapOutcome {
        match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Bootstrap failed");
                BootstrapOutcome::Failed(e)
            }
        }
    }

    async fn run(self) -> Result<BootstrapOutcome, BootstrapError> {
        let config = Arc::new(normalize(self.raw)?);
        logging::init_from_config(&config)?;
        debug!(admins = config.admins.len(), "Configuration normalized");

        let Resolved {
            instance: storage,
            info: storage_info,
        } = get_storage_plugin(&config, &self.modules)?;

        let extension_dir = prepare_extension_dir(&config).await?;
        let plugin_indexes = config.plugin_indexes();

        let backend_name = self.backend.unwrap_or_else(|| config.backend.clone());
        let bot = setup_backend(&backend_name, &config, &self.modules)?;
        info!(backend = %backend_name, "Backend ready");

        let repo_manager = (self.repo_manager)(RepoManagerSettings {
            storage: Arc::clone(&storage),
            extension_dir,
            plugin_indexes,
        })
        .map_err(BootstrapError::RepoManager)?;

        let extension_manager = (self.extension_manager)(ExtensionManagerSettings {
            storage: Arc::clone(&storage),
            extra_dirs: config.extra_extension_dirs(),
            autoinstall_deps: config.autoinstall_deps,
            core_extensions: config.core_extensions.clone(),
            factory: bot.extension_factory(),
            callback_order: config.callback_order.clone(),
        })
        .map_err(BootstrapError::ExtensionManager)?;

        bot.attach_storage_plugin(storage)?;
        bot.attach_repo_manager(repo_manager)?;
        bot.attach_extension_manager(extension_manager)?;
        debug!(storage = %storage_info.name, "Collaborators attached");

        bot.initialize_backend_storage()?;

        if let Some(path) = &self.restore {
            if bot.has_repository_state()? {
                return Err(BootstrapError::RestorePrecondition);
            }
            let operations = restore_from_file(&bot, path).await?;
            return Ok(BootstrapOutcome::Restored { operations });
        }

        let report = bot.load_extensions().await?;
        if !report.is_clean() {
            let text = report.error_text();
            warn!(errors = %text, "Extensions failed to load");
            bot.record_startup_errors(text);
        }
        info!(extensions = report.loaded.len(), "Bot ready");

        Ok(BootstrapOutcome::Ready { bot, report })
    }
}

/// Resolves and constructs the configured storage plugin.
pub fn get_storage_plugin(
    config: &BotConfig,
    modules: &ModuleTable,
) -> Result<Resolved<Arc<dyn StoragePlugin>>, PluginError> {
    let resolver = PluginResolver::new(
        modules,
        config.extra_storage_dirs(),
        config.plugin_search_order,
    );
    let resolved = resolver.resolve::<StorageCapability>(&config.storage, config)?;
    info!(
        plugin = %resolved.info.name,
        source = %resolved.info.source,
        "Found storage plugin"
    );
    Ok(resolved)
}

/// Resolves the backend `name` and builds a [`Bot`] around it.
pub fn setup_backend(
    name: &str,
    config: &Arc<BotConfig>,
    modules: &ModuleTable,
) -> Result<Arc<Bot>, PluginError> {
    let resolver = PluginResolver::new(
        modules,
        config.extra_backend_dirs(),
        config.plugin_search_order,
    );
    let Resolved { instance, info } = resolver.resolve::<BackendCapability>(name, config)?;
    info!(plugin = %info.name, source = %info.source, "Found backend plugin");
    Ok(Bot::new(Arc::clone(config), instance))
}

/// Creates `<data_dir>/extensions` with mode `0o755` if it does not exist.
pub async fn prepare_extension_dir(config: &BotConfig) -> Result<PathBuf, BootstrapError> {
    let path = config.extension_dir();
    create_dir_if_missing(&path)
        .await
        .map_err(|source| BootstrapError::ExtensionDir {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

async fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "Extension directory present");
        return Ok(());
    }
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(path).await?;
    info!(path = %path.display(), "Extension directory created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use ember_core::RawConfig;

    use super::*;

    fn raw(data_dir: &Path) -> RawConfig {
        RawConfig {
            admins: Some(vec!["@admin".into()]),
            data_dir: Some(data_dir.to_path_buf()),
            storage: Some("Memory".into()),
            backend: Some("Null".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            BootstrapOutcome::Restored { operations: 0 }.exit_code(),
            0
        );
        assert_eq!(
            BootstrapOutcome::Failed(BootstrapError::RestorePrecondition).exit_code(),
            1
        );
    }

    #[test]
    fn test_storage_plugin_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let config = normalize(raw(dir.path())).unwrap();
        let resolved = get_storage_plugin(&config, &ModuleTable::builtin()).unwrap();
        assert_eq!(resolved.info.name, "Memory");
    }

    #[test]
    fn test_unknown_backend_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(normalize(raw(dir.path())).unwrap());
        let err = setup_backend("Matrix", &config, &ModuleTable::builtin()).unwrap_err();
        assert!(matches!(err, PluginError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_ready_with_core_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = Bootstrap::new(raw(dir.path())).setup().await;
        assert_eq!(outcome.exit_code(), 0);
        let BootstrapOutcome::Ready { bot, report } = outcome else {
            panic!("expected Ready");
        };
        assert!(report.is_clean());
        assert_eq!(bot.backend().mode(), "null");
        assert!(bot.startup_errors().is_none());
        assert!(dir.path().join("extensions").is_dir());
    }

    #[tokio::test]
    async fn test_backend_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = raw(dir.path());
        config.backend = Some("Text".into());
        let outcome = Bootstrap::new(config).backend("Null").setup().await;
        let BootstrapOutcome::Ready { bot, .. } = outcome else {
            panic!("expected Ready");
        };
        assert_eq!(bot.backend().mode(), "null");
    }
}
