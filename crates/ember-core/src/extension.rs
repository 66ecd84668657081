//! Extension capability and the extension manager interface.
//!
//! Extensions are independently loadable units of bot behaviour. The host
//! never constructs them directly: it hands the extension manager an
//! [`ExtensionFactory`] bound to the bot, and the manager calls it with each
//! extension's name and [`ExtensionConstructor`].

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::bot::Bot;
use crate::config::{ConfigError, ConfigResult};
use crate::error::{BoxError, StorageResult};
use crate::storage::StoragePlugin;

// =============================================================================
// Extension
// =============================================================================

/// A live extension instance.
#[async_trait]
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Called once after construction, in dependency order.
    async fn activate(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// What an extension receives at construction time.
///
/// Holds a weak reference: the bot owns the extension manager, which owns
/// the extensions.
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    name: String,
    bot: Weak<Bot>,
}

impl ExtensionContext {
    pub fn new(name: impl Into<String>, bot: Weak<Bot>) -> Self {
        Self {
            name: name.into(),
            bot,
        }
    }

    /// Name the extension was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning bot, or `None` once it has been dropped.
    pub fn bot(&self) -> Option<Arc<Bot>> {
        self.bot.upgrade()
    }
}

/// Builds an extension from its context.
pub type ExtensionConstructor = fn(ExtensionContext) -> Result<Box<dyn Extension>, BoxError>;

/// Binds the bot to an extension name and constructor.
///
/// See [`Bot::extension_factory`].
pub type ExtensionFactory =
    Arc<dyn Fn(&str, ExtensionConstructor) -> Result<Box<dyn Extension>, BoxError> + Send + Sync>;

/// A static, `Copy` handle to a compiled-in extension.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionDescriptor {
    /// Name used in logs, manifests and `core_extensions`.
    pub name: &'static str,
    pub description: &'static str,
    /// Names of extensions that must be active first.
    pub depends_on: &'static [&'static str],
    pub create: ExtensionConstructor,
}

// =============================================================================
// CallbackOrder
// =============================================================================

/// One entry of an explicit callback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSlot {
    Named(String),
    /// Every extension not named elsewhere, in discovery order.
    Rest,
}

/// Relative order in which extensions are activated and receive callbacks.
///
/// Configured as a list of names where `"*"` stands for all remaining
/// extensions. `["*"]` is [`CallbackOrder::Unordered`]. A list without `"*"`
/// places unnamed extensions last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallbackOrder {
    #[default]
    Unordered,
    Explicit(Vec<OrderSlot>),
}

impl CallbackOrder {
    /// Parses the configured slot list.
    pub fn from_slots<I, S>(slots: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Vec::new();
        let mut seen = HashSet::new();
        let mut rest_seen = false;

        for slot in slots {
            let slot = slot.into();
            if slot == "*" {
                if rest_seen {
                    return Err(ConfigError::validation(
                        "callback_order may contain \"*\" at most once",
                    ));
                }
                rest_seen = true;
                parsed.push(OrderSlot::Rest);
            } else {
                if !seen.insert(slot.clone()) {
                    return Err(ConfigError::validation(format!(
                        "callback_order names '{slot}' more than once"
                    )));
                }
                parsed.push(OrderSlot::Named(slot));
            }
        }

        if !rest_seen {
            parsed.push(OrderSlot::Rest);
        }

        if parsed == [OrderSlot::Rest] {
            return Ok(Self::Unordered);
        }
        Ok(Self::Explicit(parsed))
    }

    /// Returns `names` rearranged according to this order.
    ///
    /// Named slots that match nothing are skipped.
    pub fn arrange<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let slots = match self {
            Self::Unordered => {
                return names.iter().map(|n| n.as_ref().to_string()).collect();
            }
            Self::Explicit(slots) => slots,
        };

        let named: HashSet<&str> = slots
            .iter()
            .filter_map(|slot| match slot {
                OrderSlot::Named(name) => Some(name.as_str()),
                OrderSlot::Rest => None,
            })
            .collect();

        let mut arranged = Vec::with_capacity(names.len());
        for slot in slots {
            match slot {
                OrderSlot::Named(name) => {
                    if names.iter().any(|n| n.as_ref() == name) {
                        arranged.push(name.clone());
                    }
                }
                OrderSlot::Rest => arranged.extend(
                    names
                        .iter()
                        .map(|n| n.as_ref())
                        .filter(|n| !named.contains(n))
                        .map(str::to_string),
                ),
            }
        }
        arranged
    }
}

// =============================================================================
// Extension manager
// =============================================================================

/// Outcome of one extension loading pass.
///
/// Only failures land in `errors`; an empty map means every discovered
/// extension is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionLoadReport {
    pub loaded: Vec<String>,
    /// Extension name → human-readable failure.
    pub errors: BTreeMap<String, String>,
}

impl ExtensionLoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn record_loaded(&mut self, name: impl Into<String>) {
        self.loaded.push(name.into());
    }

    pub fn record_error(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(name.into(), message.into());
    }

    /// All failure messages joined by newlines, in name order.
    pub fn error_text(&self) -> String {
        self.errors
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Loads, tracks and configures extensions.
#[async_trait]
pub trait ExtensionManager: Send + Sync {
    /// Discovers and activates every extension found in `paths`.
    ///
    /// Per-extension failures are reported, never raised.
    async fn update_extension_places(&self, paths: &[PathBuf]) -> ExtensionLoadReport;

    /// Names of active extensions, in activation order.
    fn loaded_extensions(&self) -> Vec<String>;

    /// Stores the configuration section for `extension`.
    fn set_extension_config(&self, extension: &str, config: Value) -> StorageResult<()>;

    /// Writes `key` into the private store of `extension`.
    fn set_extension_value(&self, extension: &str, key: &str, value: Value) -> StorageResult<()>;

    /// Deactivates every active extension, most recently activated first.
    async fn deactivate_all(&self) {}
}

/// Everything an extension manager is constructed from.
#[derive(Clone)]
pub struct ExtensionManagerSettings {
    pub storage: Arc<dyn StoragePlugin>,
    pub extra_dirs: Vec<PathBuf>,
    pub autoinstall_deps: bool,
    /// `None` loads every core extension.
    pub core_extensions: Option<Vec<String>>,
    pub factory: ExtensionFactory,
    pub callback_order: CallbackOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_alone_is_unordered() {
        assert_eq!(
            CallbackOrder::from_slots(["*"]).unwrap(),
            CallbackOrder::Unordered
        );
    }

    #[test]
    fn test_explicit_order_arranges_named_then_rest() {
        let order = CallbackOrder::from_slots(["Webhooks", "*", "Help"]).unwrap();
        let names = ["Help", "Echo", "Webhooks", "Health"];
        assert_eq!(
            order.arrange(&names),
            vec!["Webhooks", "Echo", "Health", "Help"]
        );
    }

    #[test]
    fn test_missing_star_puts_unnamed_last() {
        let order = CallbackOrder::from_slots(["Help"]).unwrap();
        assert_eq!(order.arrange(&["Echo", "Help"]), vec!["Help", "Echo"]);
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let order = CallbackOrder::from_slots(["Ghost", "*"]).unwrap();
        assert_eq!(order.arrange(&["Echo"]), vec!["Echo"]);
    }

    #[test]
    fn test_duplicate_slots_rejected() {
        assert!(CallbackOrder::from_slots(["*", "*"]).is_err());
        assert!(CallbackOrder::from_slots(["Help", "Help"]).is_err());
    }

    #[test]
    fn test_report_error_text_joins_messages() {
        let mut report = ExtensionLoadReport::default();
        assert!(report.is_clean());
        report.record_loaded("Echo");
        report.record_error("b", "second failed");
        report.record_error("a", "first failed");
        assert!(!report.is_clean());
        assert_eq!(report.error_text(), "first failed\nsecond failed");
    }
}
