//! Logging setup for the Ember runtime.
//!
//! Builds one `tracing-subscriber` registry from the `log` section of the
//! configuration:
//!
//! - an `EnvFilter` from `log.level`, overridden by `RUST_LOG`
//! - a console layer on stderr (`compact`, `full`, `pretty`, or `json` with
//!   the `json-log` feature)
//! - an optional plain-text file layer when `log.file` is set
//! - an optional Logstash layer (`logstash` feature) shipping JSON lines over TCP
//! - an optional Sentry layer (`sentry` feature) turning records into
//!   breadcrumbs and events
//!
//! # Example
//!
//! ```rust,ignore
//! use ember_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("ember_framework=trace")
//!     .try_init()?;
//! ```

use std::path::{Path, PathBuf};

use ember_core::BotConfig;
use ember_core::config::{LogFormat, LogstashConfig, SentryConfig};
use thiserror::Error;
use tracing::debug;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while configuring log sinks.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The configuration asks for a sink whose support is compiled out.
    #[error("{integration} requires the `{feature}` feature of ember-runtime")]
    MissingIntegration {
        integration: &'static str,
        feature: &'static str,
    },

    /// The log file could not be opened.
    #[error("failed to open log file {path}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: InitError,
    },

    /// The Logstash endpoint could not be reached.
    #[error("failed to connect to logstash at {addr}")]
    Logstash {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sentry dsn: {0}")]
    SentryDsn(String),
}

/// Initializes logging from the complete configuration.
///
/// A global subscriber that is already installed is kept; this is not an error.
pub fn init_from_config(config: &BotConfig) -> Result<(), TelemetryError> {
    LoggingBuilder::from_config(config).try_init()
}

/// A builder for the global subscriber.
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    format: LogFormat,
    ansi: bool,
    file_path: Option<PathBuf>,
    logstash: Option<LogstashConfig>,
    sentry: Option<SentryConfig>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            format: LogFormat::Compact,
            ansi: true,
            file_path: None,
            logstash: None,
            sentry: None,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        let log = &config.log;
        Self {
            level: log.level.to_tracing_level(),
            directives: Vec::new(),
            format: log.format,
            ansi: config.text_color_theme.ansi(),
            file_path: log.file.clone(),
            logstash: log.logstash.enabled.then(|| log.logstash.clone()),
            sentry: log.sentry.enabled.then(|| log.sentry.clone()),
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `"ember_framework=trace"`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables ANSI colors on the console.
    pub fn ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Additionally writes plain-text logs to `path`.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Ships logs to Logstash as well.
    pub fn logstash(mut self, config: LogstashConfig) -> Self {
        self.logstash = Some(config);
        self
    }

    /// Reports breadcrumbs and events to Sentry as well.
    pub fn sentry(mut self, config: SentryConfig) -> Self {
        self.sentry = Some(config);
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_filter = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));
        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// Checks that every requested sink is compiled in.
    fn check_integrations(&self) -> Result<(), TelemetryError> {
        if self.format == LogFormat::Json && !cfg!(feature = "json-log") {
            return Err(TelemetryError::MissingIntegration {
                integration: "JSON log format",
                feature: "json-log",
            });
        }
        if self.logstash.is_some() && !cfg!(feature = "logstash") {
            return Err(TelemetryError::MissingIntegration {
                integration: "Logstash logging",
                feature: "logstash",
            });
        }
        if self.sentry.is_some() && !cfg!(feature = "sentry") {
            return Err(TelemetryError::MissingIntegration {
                integration: "Sentry reporting",
                feature: "sentry",
            });
        }
        Ok(())
    }

    fn console_layer(&self) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(self.ansi)
            .with_target(true);
        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
            // Rejected by `check_integrations`.
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => layer.boxed(),
        }
    }

    fn file_layer(path: &Path) -> Result<BoxedLayer, TelemetryError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ember.log".to_string());
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir)
            .map_err(|source| TelemetryError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .boxed())
    }

    fn layers(&self) -> Result<Vec<BoxedLayer>, TelemetryError> {
        self.check_integrations()?;

        let mut layers = vec![self.console_layer()];
        if let Some(path) = &self.file_path {
            layers.push(Self::file_layer(path)?);
        }
        #[cfg(feature = "logstash")]
        if let Some(config) = &self.logstash {
            layers.push(logstash::layer(config)?);
        }
        #[cfg(feature = "sentry")]
        if let Some(config) = &self.sentry {
            layers.push(sentry_sink::layer(config)?);
        }
        Ok(layers)
    }

    /// Installs the global subscriber.
    ///
    /// Fails only when a requested sink cannot be set up. If another
    /// subscriber is already installed it stays in place.
    pub fn try_init(self) -> Result<(), TelemetryError> {
        let layers = self.layers()?;
        let filter = self.build_filter();
        if let Err(e) = tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
        {
            debug!(error = %e, "Global subscriber already installed, keeping it");
        }
        Ok(())
    }
}

#[cfg(feature = "logstash")]
mod logstash {
    //! JSON lines over TCP, tagged with `application` and `environment`.

    use std::io::{self, Write};
    use std::net::TcpStream;

    use ember_core::config::LogstashConfig;
    use parking_lot::Mutex;
    use serde_json::{Map, Value};
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::{Layer, fmt};

    use super::{BoxedLayer, TelemetryError};

    pub(super) fn layer(config: &LogstashConfig) -> Result<BoxedLayer, TelemetryError> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = TcpStream::connect(&addr)
            .map_err(|source| TelemetryError::Logstash { addr, source })?;
        let sink = LogstashSink {
            stream: Mutex::new(stream),
            application: config.app.clone(),
            environment: config.env.clone(),
        };
        Ok(fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(sink)
            .boxed())
    }

    struct LogstashSink {
        stream: Mutex<TcpStream>,
        application: String,
        environment: String,
    }

    impl LogstashSink {
        fn tag(&self, line: &[u8]) -> Vec<u8> {
            let Ok(mut record) = serde_json::from_slice::<Map<String, Value>>(line) else {
                return line.to_vec();
            };
            record.insert("application".into(), Value::from(self.application.as_str()));
            record.insert("environment".into(), Value::from(self.environment.as_str()));
            let mut out = serde_json::to_vec(&record).unwrap_or_else(|_| line.to_vec());
            out.push(b'\n');
            out
        }
    }

    impl<'a> MakeWriter<'a> for LogstashSink {
        type Writer = LogstashWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LogstashWriter { sink: self }
        }
    }

    struct LogstashWriter<'a> {
        sink: &'a LogstashSink,
    }

    impl Write for LogstashWriter<'_> {
        // fmt hands over one complete record per call.
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let line = self.sink.tag(buf);
            self.sink.stream.lock().write_all(&line)?;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.sink.stream.lock().flush()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_records_are_tagged() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
            let sink = LogstashSink {
                stream: Mutex::new(stream),
                application: "ember".into(),
                environment: "test".into(),
            };

            let tagged = sink.tag(b"{\"message\":\"hi\"}\n");
            let record: Map<String, Value> = serde_json::from_slice(&tagged).unwrap();
            assert_eq!(record["application"], "ember");
            assert_eq!(record["environment"], "test");
            assert_eq!(record["message"], "hi");

            assert_eq!(sink.tag(b"not json"), b"not json".to_vec());
        }
    }
}

#[cfg(feature = "sentry")]
mod sentry_sink {
    //! Breadcrumbs and events through `sentry-tracing`.

    use std::sync::OnceLock;

    use ember_core::config::SentryConfig;
    use sentry::types::Dsn;
    use sentry::{ClientInitGuard, ClientOptions};
    use sentry_tracing::EventFilter;
    use tracing::Level;
    use tracing_subscriber::Layer;

    use super::{BoxedLayer, TelemetryError};

    // Dropping the guard shuts the client down.
    static GUARD: OnceLock<ClientInitGuard> = OnceLock::new();

    pub(super) fn layer(config: &SentryConfig) -> Result<BoxedLayer, TelemetryError> {
        let dsn = config
            .dsn
            .as_deref()
            .map(|dsn| {
                dsn.parse::<Dsn>()
                    .map_err(|e| TelemetryError::SentryDsn(e.to_string()))
            })
            .transpose()?;

        if GUARD.get().is_none() {
            let guard = sentry::init(ClientOptions {
                dsn,
                release: sentry::release_name!(),
                ..Default::default()
            });
            let _ = GUARD.set(guard);
        }

        let breadcrumb_level = config.level.to_tracing_level();
        let event_level = config.event_level.to_tracing_level();
        Ok(sentry_tracing::layer()
            .event_filter(move |metadata| {
                classify(*metadata.level(), breadcrumb_level, event_level)
            })
            .boxed())
    }

    /// `tracing` orders levels by verbosity, so "at or above" is `<=`.
    pub(super) fn classify(level: Level, breadcrumb: Level, event: Level) -> EventFilter {
        if level <= event {
            EventFilter::Event
        } else if level <= breadcrumb {
            EventFilter::Breadcrumb
        } else {
            EventFilter::Ignore
        }
    }

}
