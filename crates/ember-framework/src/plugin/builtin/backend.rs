//! Built-in chat backends.
//!
//! - `Text` talks to the local terminal: every stdin line is a message.
//! - `Null` connects to nothing and idles until Ctrl+C.

use std::sync::Arc;

use async_trait::async_trait;
use ember_core::config::ColorTheme;
use ember_core::{Backend, Bot, BotConfig, BoxError, Storage, StorageResult};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info};

use crate::plugin::{PluginDescriptor, PluginFactory};

pub const TEXT_BACKEND: PluginDescriptor = PluginDescriptor {
    name: "Text",
    module: "text",
    description: "Interactive terminal backend reading messages from stdin",
    factory: PluginFactory::Backend(TextBackend::create),
};

pub const NULL_BACKEND: PluginDescriptor = PluginDescriptor {
    name: "Null",
    module: "null",
    description: "Backend without a chat network, idles until interrupted",
    factory: PluginFactory::Backend(NullBackend::create),
};

/// Store key holding the number of lines the text backend has processed.
const LINES_SEEN_KEY: &str = "text.lines_seen";

// ─── TextBackend ──────────────────────────────────────────────────────────────

pub struct TextBackend {
    prefix: String,
    nick: String,
    demo_mode: bool,
    theme: ColorTheme,
}

impl TextBackend {
    fn create(config: &BotConfig) -> Result<Box<dyn Backend>, BoxError> {
        Ok(Box::new(Self {
            prefix: config.prefix.clone(),
            nick: config.chatroom_fn.clone(),
            demo_mode: config.text_demo_mode,
            theme: config.text_color_theme,
        }))
    }

    fn render(&self, line: &str) -> Option<String> {
        let command = line.strip_prefix(&self.prefix)?.trim();
        if command.is_empty() {
            return None;
        }
        let reply = format!("{}: received command '{command}'", self.nick);
        Some(match self.theme {
            ColorTheme::Light => format!("\x1b[34m{reply}\x1b[0m"),
            ColorTheme::Dark => format!("\x1b[96m{reply}\x1b[0m"),
            ColorTheme::Mono => reply,
        })
    }
}

#[async_trait]
impl Backend for TextBackend {
    fn mode(&self) -> &str {
        "text"
    }

    fn init_storage(&self, store: &dyn Storage) -> StorageResult<()> {
        if !store.contains(LINES_SEEN_KEY)? {
            store.set(LINES_SEEN_KEY, Value::from(0u64))?;
        }
        Ok(())
    }

    async fn serve_forever(&self, bot: Arc<Bot>) -> Result<(), BoxError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        if self.demo_mode {
            stdout.write_all(b"Type a message, Ctrl+D to quit.\n").await?;
            stdout.flush().await?;
        }

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("Input closed, stopping text backend");
                        break;
                    };
                    debug!(line = %line, "Message received");
                    if let Ok(store) = bot.store() {
                        let seen = store
                            .get(LINES_SEEN_KEY)?
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0);
                        store.set(LINES_SEEN_KEY, Value::from(seen + 1))?;
                    }
                    if let Some(reply) = self.render(&line) {
                        stdout.write_all(reply.as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping text backend");
                    break;
                }
            }
        }
        Ok(())
    }
}

// ─── NullBackend ──────────────────────────────────────────────────────────────

pub struct NullBackend;

impl NullBackend {
    fn create(_config: &BotConfig) -> Result<Box<dyn Backend>, BoxError> {
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Backend for NullBackend {
    fn mode(&self) -> &str {
        "null"
    }

    async fn serve_forever(&self, _bot: Arc<Bot>) -> Result<(), BoxError> {
        info!("Null backend idle, press Ctrl+C to stop");
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, stopping null backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ember_core::{RawConfig, normalize};

    use super::*;
    use crate::plugin::builtin::MemoryStorage;
    use ember_core::StoragePlugin;

    fn config(theme: ColorTheme) -> BotConfig {
        normalize(RawConfig {
            admins: Some(vec!["@admin".into()]),
            text_color_theme: Some(theme),
            ..Default::default()
        })
        .unwrap()
    }

    fn text(theme: ColorTheme) -> TextBackend {
        let config = config(theme);
        TextBackend {
            prefix: config.prefix,
            nick: config.chatroom_fn,
            demo_mode: config.text_demo_mode,
            theme: config.text_color_theme,
        }
    }

    #[test]
    fn test_only_prefixed_lines_get_replies() {
        let backend = text(ColorTheme::Mono);
        assert_eq!(
            backend.render("!help").as_deref(),
            Some("Ember: received command 'help'")
        );
        assert_eq!(backend.render("hello"), None);
        assert_eq!(backend.render("!"), None);
    }

    #[test]
    fn test_colored_themes_wrap_in_ansi() {
        let reply = text(ColorTheme::Dark).render("!status").unwrap();
        assert!(reply.starts_with("\x1b[96m"));
        assert!(reply.ends_with("\x1b[0m"));
    }

    #[test]
    fn test_text_init_storage_seeds_counter() {
        let storage = MemoryStorage::new();
        let store = storage.open("core").unwrap();
        let backend = text(ColorTheme::Mono);

        backend.init_storage(store.as_ref()).unwrap();
        store.set(LINES_SEEN_KEY, Value::from(7u64)).unwrap();
        backend.init_storage(store.as_ref()).unwrap();

        assert_eq!(store.get(LINES_SEEN_KEY).unwrap(), Some(Value::from(7u64)));
    }

    #[test]
    fn test_factories_report_modes() {
        let config = config(ColorTheme::Light);
        assert_eq!(TextBackend::create(&config).unwrap().mode(), "text");
        assert_eq!(NullBackend::create(&config).unwrap().mode(), "null");
    }
}
