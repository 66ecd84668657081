//! Configuration record for the Ember host.
//!
//! Loaders (see `ember-runtime`) produce a [`RawConfig`]; [`normalize`] fills
//! every unset option with its documented default and returns an immutable
//! [`BotConfig`]. Nothing downstream ever sees a partially filled record.

pub mod error;
pub mod normalize;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use normalize::normalize;
pub use schema::{
    BotConfig, ColorTheme, EXTENSIONS_SUBDIR, LogConfig, LogFormat, LogLevel, LogstashConfig,
    OneOrMany, RawConfig, RawLogConfig, RawLogstashConfig, RawSentryConfig, SearchOrder,
    SentryConfig,
};
