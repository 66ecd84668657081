//! Replay of recorded state onto a freshly bootstrapped bot.
//!
//! A restore script is a JSON Lines file. Blank lines and lines starting with
//! `#` are skipped; every other line is one [`RestoreOp`]:
//!
//! ```text
//! # backup taken 2026-01-12
//! {"op":"log","level":"info","message":"restoring"}
//! {"op":"set_repos","repos":{"weather":{"url":"https://example.org/weather.git"}}}
//! {"op":"set_core","key":"motd","value":"hello"}
//! {"op":"set_extension_config","extension":"Weather","config":{"units":"metric"}}
//! {"op":"load_extensions"}
//! ```
//!
//! The script can rewrite any stored state but cannot run code. The whole
//! file is parsed before the first operation runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ember_core::config::LogLevel;
use ember_core::{Bot, BotError, RepoEntry};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Errors raised while reading or replaying a restore script.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("failed to read restore script {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restore script line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("restore operation `{op}` on line {line} failed: {source}")]
    Operation {
        line: usize,
        op: &'static str,
        #[source]
        source: BotError,
    },

    /// The script ran but storage could not be closed afterwards.
    #[error("failed to close storage after restore: {0}")]
    Close(#[source] BotError),
}

pub type RestoreResult<T> = Result<T, RestoreError>;

/// One replayable operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RestoreOp {
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    SetRepos {
        repos: BTreeMap<String, RepoEntry>,
    },
    AddRepo {
        name: String,
        #[serde(default)]
        entry: RepoEntry,
    },
    SetCore {
        key: String,
        value: Value,
    },
    SetExtensionConfig {
        extension: String,
        config: Value,
    },
    SetExtensionValue {
        extension: String,
        key: String,
        value: Value,
    },
    LoadExtensions,
}

impl RestoreOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::SetRepos { .. } => "set_repos",
            Self::AddRepo { .. } => "add_repo",
            Self::SetCore { .. } => "set_core",
            Self::SetExtensionConfig { .. } => "set_extension_config",
            Self::SetExtensionValue { .. } => "set_extension_value",
            Self::LoadExtensions => "load_extensions",
        }
    }

    async fn apply(self, bot: &Bot) -> Result<(), BotError> {
        match self {
            Self::Log { level, message } => {
                match level {
                    LogLevel::Trace => trace!(target: "ember::restore", "{message}"),
                    LogLevel::Debug => debug!(target: "ember::restore", "{message}"),
                    LogLevel::Info => info!(target: "ember::restore", "{message}"),
                    LogLevel::Warn => warn!(target: "ember::restore", "{message}"),
                    LogLevel::Error => error!(target: "ember::restore", "{message}"),
                }
                Ok(())
            }
            Self::SetRepos { repos } => Ok(bot.repo_manager()?.set_repos(repos)?),
            Self::AddRepo { name, entry } => Ok(bot.repo_manager()?.add_repo(&name, entry)?),
            Self::SetCore { key, value } => bot.set_core_value(&key, value),
            Self::SetExtensionConfig { extension, config } => Ok(bot
                .extension_manager()?
                .set_extension_config(&extension, config)?),
            Self::SetExtensionValue {
                extension,
                key,
                value,
            } => Ok(bot
                .extension_manager()?
                .set_extension_value(&extension, &key, value)?),
            Self::LoadExtensions => {
                let report = bot.load_extensions().await?;
                if !report.is_clean() {
                    bot.record_startup_errors(report.error_text());
                }
                Ok(())
            }
        }
    }
}

/// A fully parsed restore script.
#[derive(Debug, Clone, Default)]
pub struct RestoreScript {
    /// Operations with their 1-based source line.
    ops: Vec<(usize, RestoreOp)>,
}

impl RestoreScript {
    /// Parses a script. Nothing is executed.
    pub fn parse(source: &str) -> RestoreResult<Self> {
        let mut ops = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let op = serde_json::from_str(trimmed).map_err(|source| RestoreError::Parse {
                line: line_no,
                source,
            })?;
            ops.push((line_no, op));
        }
        Ok(Self { ops })
    }

    pub async fn load(path: &Path) -> RestoreResult<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RestoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&source)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Runs every operation in order, stopping at the first failure.
    ///
    /// Returns the number of operations applied.
    pub async fn execute(self, bot: &Bot) -> RestoreResult<usize> {
        let mut applied = 0;
        for (line, op) in self.ops {
            let name = op.name();
            debug!(line, op = name, "Applying restore operation");
            op.apply(bot)
                .await
                .map_err(|source| RestoreError::Operation {
                    line,
                    op: name,
                    source,
                })?;
            applied += 1;
        }
        Ok(applied)
    }
}

/// Replays the script at `path` onto `bot`, then closes storage.
///
/// Storage is closed exactly once, whether the script succeeded or not.
pub async fn restore_from_file(bot: &Bot, path: &Path) -> RestoreResult<usize> {
    info!(path = %path.display(), "Restoring bot state");
    let result = match RestoreScript::load(path).await {
        Ok(script) => script.execute(bot).await,
        Err(e) => Err(e),
    };
    let closed = bot.close_storage();

    let applied = result?;
    closed.map_err(RestoreError::Close)?;
    info!(applied, "Restore complete");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let script = RestoreScript::parse(
            "# header\n\n{\"op\":\"set_core\",\"key\":\"k\",\"value\":1}\n   \n{\"op\":\"load_extensions\"}\n",
        )
        .unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.ops[0].0, 3);
        assert_eq!(
            script.ops[0].1,
            RestoreOp::SetCore {
                key: "k".into(),
                value: Value::from(1)
            }
        );
        assert_eq!(script.ops[1], (5, RestoreOp::LoadExtensions));
    }

    #[test]
    fn test_parse_reports_failing_line() {
        let err = RestoreScript::parse(
            "{\"op\":\"load_extensions\"}\n{\"op\":\"exec\",\"code\":\"x\"}\n",
        )
        .unwrap_err();
        assert!(matches!(err, RestoreError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_log_level_defaults_to_info() {
        let script = RestoreScript::parse("{\"op\":\"log\",\"message\":\"hi\"}").unwrap();
        assert_eq!(
            script.ops[0].1,
            RestoreOp::Log {
                level: LogLevel::Info,
                message: "hi".into()
            }
        );
        assert_eq!(script.ops[0].1.name(), "log");
    }

    #[test]
    fn test_add_repo_entry_fields() {
        let script = RestoreScript::parse(
            r#"{"op":"add_repo","name":"weather","entry":{"url":"https://example.org/w.git","branch":"main"}}"#,
        )
        .unwrap();
        let RestoreOp::AddRepo { name, entry } = &script.ops[0].1 else {
            panic!("expected add_repo");
        };
        assert_eq!(name, "weather");
        assert_eq!(entry.url.as_deref(), Some("https://example.org/w.git"));
        assert_eq!(entry.extra["branch"], "main");
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let err = RestoreScript::load(Path::new("/nonexistent/restore.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, RestoreError::Read { .. }));
    }
}
