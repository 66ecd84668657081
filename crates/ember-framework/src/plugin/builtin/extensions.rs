//! Core extensions compiled into the host.
//!
//! These are always discoverable by the default extension manager;
//! `core_extensions` in the configuration restricts which of them load.

use async_trait::async_trait;
use ember_core::{BoxError, Extension, ExtensionContext, ExtensionDescriptor};
use serde_json::Value;
use tracing::info;

use crate::manager::extension_namespace;

pub const HEALTH: ExtensionDescriptor = ExtensionDescriptor {
    name: "Health",
    description: "Counts activations and reports bot liveness",
    depends_on: &[],
    create: Health::create,
};

pub const HELP: ExtensionDescriptor = ExtensionDescriptor {
    name: "Help",
    description: "Lists available commands",
    depends_on: &[],
    create: Help::create,
};

pub const UTILS: ExtensionDescriptor = ExtensionDescriptor {
    name: "Utils",
    description: "Small administrative helpers",
    depends_on: &["Help"],
    create: Utils::create,
};

/// Store key incremented every time `Health` activates.
pub const ACTIVATIONS_KEY: &str = "activations";

struct Health {
    ctx: ExtensionContext,
}

impl Health {
    fn create(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        Ok(Box::new(Self { ctx }))
    }
}

#[async_trait]
impl Extension for Health {
    fn name(&self) -> &str {
        self.ctx.name()
    }

    async fn activate(&self) -> Result<(), BoxError> {
        let bot = self.ctx.bot().ok_or("bot dropped before extension activation")?;
        let store = bot
            .storage_plugin()?
            .open(&extension_namespace(self.ctx.name()))?;
        let activations = store
            .get(ACTIVATIONS_KEY)?
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        store.set(ACTIVATIONS_KEY, Value::from(activations))?;
        info!(activations, "Health extension active");
        Ok(())
    }
}

struct Help {
    prefix: String,
}

impl Help {
    fn create(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        let prefix = ctx
            .bot()
            .map(|bot| bot.config().prefix.clone())
            .ok_or("bot dropped before extension construction")?;
        Ok(Box::new(Self { prefix }))
    }
}

#[async_trait]
impl Extension for Help {
    fn name(&self) -> &str {
        HELP.name
    }

    async fn activate(&self) -> Result<(), BoxError> {
        info!(prefix = %self.prefix, "Help available via {}help", self.prefix);
        Ok(())
    }
}

struct Utils {
    name: String,
}

impl Utils {
    fn create(ctx: ExtensionContext) -> Result<Box<dyn Extension>, BoxError> {
        Ok(Box::new(Self {
            name: ctx.name().to_string(),
        }))
    }
}

#[async_trait]
impl Extension for Utils {
    fn name(&self) -> &str {
        &self.name
    }
}
