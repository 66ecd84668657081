//! Configuration schema definitions.
//!
//! Two shapes exist for the same set of options:
//!
//! - [`RawConfig`] is what loaders deserialize. Every option is optional.
//! - [`BotConfig`] is what the rest of the host reads. Every option is present.
//!
//! The only way from one to the other is [`normalize`](super::normalize).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extension::CallbackOrder;

/// Subdirectory of `data_dir` holding installed extension sources.
pub const EXTENSIONS_SUBDIR: &str = "extensions";

// =============================================================================
// Shared value types
// =============================================================================

/// An option that accepts either a bare value or a list of values.
///
/// ```toml
/// plugin_indexes = "https://example.org/repos.json"
/// # or
/// plugin_indexes = ["https://example.org/repos.json", "./local.json"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single bare value.
    One(T),
    /// An ordered list of values.
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Promotes the value to its canonical list form.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the equivalent `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature of `ember-runtime`.
    Json,
}

/// Terminal color theme used by console logging and the text backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Light,
    Dark,
    Mono,
}

impl ColorTheme {
    /// Whether ANSI colors should be emitted.
    pub fn ansi(self) -> bool {
        !matches!(self, Self::Mono)
    }
}

/// Which plugin search root wins when both define the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchOrder {
    /// Operator-supplied directories shadow built-in plugins.
    #[default]
    ExtraFirst,
    /// Built-in plugins shadow operator-supplied directories.
    CoreFirst,
}

// =============================================================================
// RawConfig
// =============================================================================

/// Logging options as read from a configuration source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLogConfig {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
    pub file: Option<PathBuf>,
    pub logstash: RawLogstashConfig,
    pub sentry: RawSentryConfig,
}

/// Logstash options as read from a configuration source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLogstashConfig {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub app: Option<String>,
    pub env: Option<String>,
}

/// Sentry options as read from a configuration source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSentryConfig {
    pub enabled: Option<bool>,
    pub dsn: Option<String>,
    pub level: Option<LogLevel>,
    pub event_level: Option<LogLevel>,
}

/// User-supplied configuration with every option optional.
///
/// Produced by `ConfigLoader` in `ember-runtime`, or built directly in tests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub admins: Option<Vec<String>>,
    pub admins_notifications: Option<Vec<String>>,

    pub access_controls_default: Option<Map<String, Value>>,
    pub access_controls: Option<Map<String, Value>>,
    pub access_controls_use_user_id: Option<bool>,
    pub hide_restricted_commands: Option<bool>,
    pub hide_restricted_access: Option<bool>,

    pub prefix: Option<String>,
    pub prefix_optional_on_chat: Option<bool>,
    pub alt_prefixes: Option<Vec<String>>,
    pub alt_prefix_separators: Option<Vec<String>>,
    pub alt_prefix_case_insensitive: Option<bool>,

    pub divert_to_private: Option<Vec<String>>,
    pub divert_to_thread: Option<Vec<String>>,
    pub message_size_limit: Option<usize>,
    pub groupchat_nick_prefixed: Option<bool>,
    pub suppress_cmd_not_found: Option<bool>,
    pub async_dispatch: Option<bool>,
    pub async_pool_size: Option<usize>,

    pub chatroom_presence: Option<Vec<String>>,
    pub chatroom_relay: Option<Map<String, Value>>,
    pub reverse_chatroom_relay: Option<Map<String, Value>>,
    pub chatroom_fn: Option<String>,

    pub text_demo_mode: Option<bool>,
    pub text_color_theme: Option<ColorTheme>,

    pub backend: Option<String>,
    pub storage: Option<String>,
    pub storage_config: Option<Map<String, Value>>,
    pub data_dir: Option<PathBuf>,

    pub plugin_indexes: Option<OneOrMany<String>>,
    pub extra_backend_dirs: Option<OneOrMany<PathBuf>>,
    pub extra_storage_dirs: Option<OneOrMany<PathBuf>>,
    pub extra_extension_dirs: Option<OneOrMany<PathBuf>>,
    pub plugin_search_order: Option<SearchOrder>,

    pub autoinstall_deps: Option<bool>,
    pub core_extensions: Option<Vec<String>>,
    pub callback_order: Option<Vec<String>>,

    pub log: RawLogConfig,
}

// =============================================================================
// BotConfig
// =============================================================================

/// Logstash sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogstashConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Reported as the `application` field of every record.
    pub app: String,
    /// Reported as the `environment` field of every record.
    pub env: String,
}

/// Sentry sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryConfig {
    pub enabled: bool,
    /// `None` keeps the client disabled.
    pub dsn: Option<String>,
    /// Records at or above this level become breadcrumbs.
    pub level: LogLevel,
    /// Records at or above this level are sent as events.
    pub event_level: LogLevel,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Additional plain-text log file, written alongside the console.
    pub file: Option<PathBuf>,
    pub logstash: LogstashConfig,
    pub sentry: SentryConfig,
}

/// The complete, validated configuration record.
///
/// Every option the host reads is present. Instances are only produced by
/// [`normalize`](super::normalize) and are shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub admins: Vec<String>,
    pub admins_notifications: Vec<String>,

    pub access_controls_default: Map<String, Value>,
    pub access_controls: Map<String, Value>,
    pub access_controls_use_user_id: bool,
    pub hide_restricted_commands: bool,
    pub hide_restricted_access: bool,

    pub prefix: String,
    pub prefix_optional_on_chat: bool,
    pub alt_prefixes: Vec<String>,
    pub alt_prefix_separators: Vec<String>,
    pub alt_prefix_case_insensitive: bool,

    pub divert_to_private: Vec<String>,
    pub divert_to_thread: Vec<String>,
    pub message_size_limit: usize,
    pub groupchat_nick_prefixed: bool,
    pub suppress_cmd_not_found: bool,
    pub async_dispatch: bool,
    pub async_pool_size: usize,

    pub chatroom_presence: Vec<String>,
    pub chatroom_relay: Map<String, Value>,
    pub reverse_chatroom_relay: Map<String, Value>,
    pub chatroom_fn: String,

    pub text_demo_mode: bool,
    pub text_color_theme: ColorTheme,

    /// Chat backend name, used when the caller does not name one.
    pub backend: String,
    /// Storage plugin name.
    pub storage: String,
    /// Free-form section handed to the storage plugin.
    pub storage_config: Map<String, Value>,
    pub data_dir: PathBuf,

    pub plugin_indexes: OneOrMany<String>,
    pub extra_backend_dirs: OneOrMany<PathBuf>,
    pub extra_storage_dirs: OneOrMany<PathBuf>,
    pub extra_extension_dirs: OneOrMany<PathBuf>,
    pub plugin_search_order: SearchOrder,

    pub autoinstall_deps: bool,
    /// Restricts which core extensions load; `None` loads all of them.
    pub core_extensions: Option<Vec<String>>,
    pub callback_order: CallbackOrder,

    pub log: LogConfig,
}

impl BotConfig {
    /// Directory holding installed extension sources (`<data_dir>/extensions`).
    pub fn extension_dir(&self) -> PathBuf {
        self.data_dir.join(EXTENSIONS_SUBDIR)
    }

    /// Plugin index locations in canonical list form.
    pub fn plugin_indexes(&self) -> Vec<String> {
        self.plugin_indexes.to_vec()
    }

    /// Extra backend search roots in canonical list form.
    pub fn extra_backend_dirs(&self) -> Vec<PathBuf> {
        self.extra_backend_dirs.to_vec()
    }

    /// Extra storage search roots in canonical list form.
    pub fn extra_storage_dirs(&self) -> Vec<PathBuf> {
        self.extra_storage_dirs.to_vec()
    }

    /// Extra extension directories in canonical list form.
    pub fn extra_extension_dirs(&self) -> Vec<PathBuf> {
        self.extra_extension_dirs.to_vec()
    }
}
