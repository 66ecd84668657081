//! Default filling and validation.

use std::path::PathBuf;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, LogConfig, LogLevel, LogstashConfig, OneOrMany, RawConfig, SentryConfig,
};
use crate::extension::CallbackOrder;

pub const DEFAULT_PREFIX: &str = "!";
pub const DEFAULT_MESSAGE_SIZE_LIMIT: usize = 10_000;
pub const DEFAULT_ASYNC_POOL_SIZE: usize = 10;
pub const DEFAULT_CHATROOM_FN: &str = "Ember";
pub const DEFAULT_BACKEND: &str = "Text";
pub const DEFAULT_STORAGE: &str = "File";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PLUGIN_INDEX: &str = "https://ember.invalid/repos.json";
pub const DEFAULT_LOGSTASH_HOST: &str = "127.0.0.1";
pub const DEFAULT_LOGSTASH_PORT: u16 = 5050;
pub const DEFAULT_LOGSTASH_APP: &str = "ember";
pub const DEFAULT_LOGSTASH_ENV: &str = "development";

/// Turns a raw configuration into a complete [`BotConfig`].
///
/// Pure: no I/O, no global state. `admins` is the only option without a
/// default; `admins_notifications` falls back to `admins`.
pub fn normalize(raw: RawConfig) -> ConfigResult<BotConfig> {
    let admins = raw
        .admins
        .ok_or_else(|| ConfigError::missing_field("admins"))?;
    let admins_notifications = raw.admins_notifications.unwrap_or_else(|| admins.clone());

    let callback_order =
        CallbackOrder::from_slots(raw.callback_order.unwrap_or_else(|| vec!["*".into()]))?;

    let log = raw.log;
    let logstash = log.logstash;
    let sentry = log.sentry;

    let config = BotConfig {
        admins,
        admins_notifications,

        access_controls_default: raw.access_controls_default.unwrap_or_default(),
        access_controls: raw.access_controls.unwrap_or_default(),
        access_controls_use_user_id: raw.access_controls_use_user_id.unwrap_or(false),
        hide_restricted_commands: raw.hide_restricted_commands.unwrap_or(false),
        hide_restricted_access: raw.hide_restricted_access.unwrap_or(false),

        prefix: raw.prefix.unwrap_or_else(|| DEFAULT_PREFIX.into()),
        prefix_optional_on_chat: raw.prefix_optional_on_chat.unwrap_or(false),
        alt_prefixes: raw.alt_prefixes.unwrap_or_default(),
        alt_prefix_separators: raw.alt_prefix_separators.unwrap_or_default(),
        alt_prefix_case_insensitive: raw.alt_prefix_case_insensitive.unwrap_or(false),

        divert_to_private: raw.divert_to_private.unwrap_or_default(),
        divert_to_thread: raw.divert_to_thread.unwrap_or_default(),
        message_size_limit: raw.message_size_limit.unwrap_or(DEFAULT_MESSAGE_SIZE_LIMIT),
        groupchat_nick_prefixed: raw.groupchat_nick_prefixed.unwrap_or(false),
        suppress_cmd_not_found: raw.suppress_cmd_not_found.unwrap_or(false),
        async_dispatch: raw.async_dispatch.unwrap_or(true),
        async_pool_size: raw.async_pool_size.unwrap_or(DEFAULT_ASYNC_POOL_SIZE),

        chatroom_presence: raw.chatroom_presence.unwrap_or_default(),
        chatroom_relay: raw.chatroom_relay.unwrap_or_default(),
        reverse_chatroom_relay: raw.reverse_chatroom_relay.unwrap_or_default(),
        chatroom_fn: raw.chatroom_fn.unwrap_or_else(|| DEFAULT_CHATROOM_FN.into()),

        text_demo_mode: raw.text_demo_mode.unwrap_or(true),
        text_color_theme: raw.text_color_theme.unwrap_or_default(),

        backend: raw.backend.unwrap_or_else(|| DEFAULT_BACKEND.into()),
        storage: raw.storage.unwrap_or_else(|| DEFAULT_STORAGE.into()),
        storage_config: raw.storage_config.unwrap_or_default(),
        data_dir: raw
            .data_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),

        plugin_indexes: raw
            .plugin_indexes
            .unwrap_or_else(|| OneOrMany::One(DEFAULT_PLUGIN_INDEX.into())),
        extra_backend_dirs: raw.extra_backend_dirs.unwrap_or_default(),
        extra_storage_dirs: raw.extra_storage_dirs.unwrap_or_default(),
        extra_extension_dirs: raw.extra_extension_dirs.unwrap_or_default(),
        plugin_search_order: raw.plugin_search_order.unwrap_or_default(),

        autoinstall_deps: raw.autoinstall_deps.unwrap_or(true),
        core_extensions: raw.core_extensions,
        callback_order,

        log: LogConfig {
            level: log.level.unwrap_or_default(),
            format: log.format.unwrap_or_default(),
            file: log.file,
            logstash: LogstashConfig {
                enabled: logstash.enabled.unwrap_or(false),
                host: logstash
                    .host
                    .unwrap_or_else(|| DEFAULT_LOGSTASH_HOST.into()),
                port: logstash.port.unwrap_or(DEFAULT_LOGSTASH_PORT),
                app: logstash.app.unwrap_or_else(|| DEFAULT_LOGSTASH_APP.into()),
                env: logstash.env.unwrap_or_else(|| DEFAULT_LOGSTASH_ENV.into()),
            },
            sentry: SentryConfig {
                enabled: sentry.enabled.unwrap_or(false),
                dsn: sentry.dsn,
                level: sentry.level.unwrap_or_default(),
                event_level: sentry.event_level.unwrap_or(LogLevel::Error),
            },
        },
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &BotConfig) -> ConfigResult<()> {
    if config.prefix.is_empty() {
        return Err(ConfigError::validation("prefix cannot be empty"));
    }

    if config.message_size_limit == 0 {
        return Err(ConfigError::validation(
            "message_size_limit must be greater than 0",
        ));
    }

    if config.async_pool_size == 0 {
        return Err(ConfigError::validation(
            "async_pool_size must be greater than 0",
        ));
    }

    if config.storage.is_empty() {
        return Err(ConfigError::validation("storage cannot be empty"));
    }

    if config.backend.is_empty() {
        return Err(ConfigError::validation("backend cannot be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorTheme, LogFormat, LogLevel, SearchOrder};

    fn with_admins(admins: &[&str]) -> RawConfig {
        RawConfig {
            admins: Some(admins.iter().map(|a| a.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_admins_is_fatal() {
        let err = normalize(RawConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "admins" });
        assert_eq!(err.to_string(), "admins missing from configuration");
    }

    #[test]
    fn test_empty_admins_is_accepted() {
        let config = normalize(with_admins(&[])).unwrap();
        assert!(config.admins.is_empty());
        assert!(config.admins_notifications.is_empty());
    }

    #[test]
    fn test_all_defaults() {
        let config = normalize(with_admins(&["@alice"])).unwrap();

        assert_eq!(config.admins, vec!["@alice"]);
        assert_eq!(config.admins_notifications, config.admins);
        assert!(config.access_controls_default.is_empty());
        assert!(config.access_controls.is_empty());
        assert!(!config.access_controls_use_user_id);
        assert!(!config.hide_restricted_commands);
        assert!(!config.hide_restricted_access);
        assert_eq!(config.prefix, "!");
        assert!(!config.prefix_optional_on_chat);
        assert!(config.alt_prefixes.is_empty());
        assert!(config.alt_prefix_separators.is_empty());
        assert!(!config.alt_prefix_case_insensitive);
        assert!(config.divert_to_private.is_empty());
        assert!(config.divert_to_thread.is_empty());
        assert_eq!(config.message_size_limit, 10_000);
        assert!(!config.groupchat_nick_prefixed);
        assert!(config.autoinstall_deps);
        assert!(!config.suppress_cmd_not_found);
        assert!(config.async_dispatch);
        assert_eq!(config.async_pool_size, 10);
        assert!(config.chatroom_presence.is_empty());
        assert!(config.chatroom_relay.is_empty());
        assert!(config.reverse_chatroom_relay.is_empty());
        assert_eq!(config.chatroom_fn, "Ember");
        assert!(config.text_demo_mode);
        assert_eq!(config.text_color_theme, ColorTheme::Light);
        assert_eq!(config.backend, "Text");
        assert_eq!(config.storage, "File");
        assert!(config.storage_config.is_empty());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.plugin_indexes(), vec![DEFAULT_PLUGIN_INDEX]);
        assert!(config.extra_backend_dirs().is_empty());
        assert!(config.extra_storage_dirs().is_empty());
        assert!(config.extra_extension_dirs().is_empty());
        assert_eq!(config.plugin_search_order, SearchOrder::ExtraFirst);
        assert_eq!(config.core_extensions, None);
        assert_eq!(config.callback_order, CallbackOrder::Unordered);
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.log.format, LogFormat::Compact);
        assert_eq!(config.log.file, None);
        assert!(!config.log.logstash.enabled);
        assert_eq!(config.log.logstash.host, "127.0.0.1");
        assert_eq!(config.log.logstash.port, 5050);
        assert_eq!(config.log.logstash.app, "ember");
        assert_eq!(config.log.logstash.env, "development");
        assert!(!config.log.sentry.enabled);
        assert_eq!(config.log.sentry.dsn, None);
        assert_eq!(config.log.sentry.level, LogLevel::Info);
        assert_eq!(config.log.sentry.event_level, LogLevel::Error);
    }

    #[test]
    fn test_explicit_notifications_kept() {
        let mut raw = with_admins(&["@alice", "@bob"]);
        raw.admins_notifications = Some(vec!["@ops".into()]);

        let config = normalize(raw).unwrap();
        assert_eq!(config.admins, vec!["@alice", "@bob"]);
        assert_eq!(config.admins_notifications, vec!["@ops"]);
    }

    #[test]
    fn test_explicit_values_win_over_defaults() {
        let mut raw = with_admins(&["@alice"]);
        raw.prefix = Some("?".into());
        raw.message_size_limit = Some(4096);
        raw.autoinstall_deps = Some(false);
        raw.plugin_indexes = Some(OneOrMany::Many(vec!["a".into(), "b".into()]));
        raw.extra_backend_dirs = Some(OneOrMany::One(PathBuf::from("/opt/backends")));

        let config = normalize(raw).unwrap();
        assert_eq!(config.prefix, "?");
        assert_eq!(config.message_size_limit, 4096);
        assert!(!config.autoinstall_deps);
        assert_eq!(config.plugin_indexes(), vec!["a", "b"]);
        assert_eq!(
            config.extra_backend_dirs(),
            vec![PathBuf::from("/opt/backends")]
        );
    }

    #[test]
    fn test_zero_message_size_limit_rejected() {
        let mut raw = with_admins(&["@alice"]);
        raw.message_size_limit = Some(0);
        assert!(matches!(
            normalize(raw),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_bad_callback_order_rejected() {
        let mut raw = with_admins(&["@alice"]);
        raw.callback_order = Some(vec!["*".into(), "Webhooks".into(), "*".into()]);
        assert!(matches!(
            normalize(raw),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_extension_dir_under_data_dir() {
        let mut raw = with_admins(&["@alice"]);
        raw.data_dir = Some(PathBuf::from("/var/lib/ember"));
        let config = normalize(raw).unwrap();
        assert_eq!(
            config.extension_dir(),
            PathBuf::from("/var/lib/ember/extensions")
        );
    }
}
