//! Console Bot
//!
//! Bootstraps an Ember bot from the usual configuration sources and serves it.
//!
//! # Usage
//!
//! ```bash
//! # Interactive terminal bot (Text backend by default)
//! cargo run --package console-bot -- --config ember.toml
//!
//! # Different backend
//! cargo run --package console-bot -- --backend Null
//!
//! # Replay a backup onto an empty data directory
//! cargo run --package console-bot -- --restore backup.jsonl
//!
//! # Show every backend and storage plugin that can be resolved
//! cargo run --package console-bot -- --list
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ember::core::RawConfig;
use ember::core::config::SearchOrder;
use ember::framework::{Capability, PluginResolver};
use ember::prelude::*;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "console-bot", version, about = "Run an Ember bot from the terminal")]
struct Args {
    /// Configuration file (otherwise ember.toml / config.toml are searched)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend to use instead of the configured one
    #[arg(short, long)]
    backend: Option<String>,

    /// Restore bot state from a JSON Lines script, then exit
    #[arg(long, value_name = "FILE")]
    restore: Option<PathBuf>,

    /// List available backends and storage plugins, then exit
    #[arg(long)]
    list: bool,
}

fn list_plugins(raw: &RawConfig) -> Result<()> {
    let modules = ModuleTable::builtin();
    let order = raw.plugin_search_order.unwrap_or(SearchOrder::ExtraFirst);
    let sections = [
        (
            "Backends",
            Capability::Backend,
            raw.extra_backend_dirs.as_ref().map(|d| d.to_vec()),
        ),
        (
            "Storage plugins",
            Capability::Storage,
            raw.extra_storage_dirs.as_ref().map(|d| d.to_vec()),
        ),
    ];

    for (title, capability, dirs) in sections {
        let resolver = PluginResolver::new(&modules, dirs.unwrap_or_default(), order);
        println!("{title}:");
        for plugin in resolver.catalog(capability)? {
            println!(
                "  {:<12} {:<40} [{}]",
                plugin.name, plugin.description, plugin.source
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let raw = loader.load()?;

    if args.list {
        list_plugins(&raw)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut bootstrap = Bootstrap::new(raw);
    if let Some(backend) = args.backend {
        bootstrap = bootstrap.backend(backend);
    }
    if let Some(script) = args.restore {
        bootstrap = bootstrap.restore(script);
    }

    let outcome = bootstrap.setup().await;
    let code = ExitCode::from(outcome.exit_code());
    match outcome {
        BootstrapOutcome::Ready { bot, report } => {
            if let Some(errors) = bot.startup_errors() {
                warn!("Started with extension errors:\n{errors}");
            }
            info!(extensions = ?report.loaded, "Bot started");
            bot.serve_forever().await?;
        }
        BootstrapOutcome::Restored { operations } => {
            println!("Restored {operations} operations");
        }
        BootstrapOutcome::Failed(e) => {
            eprintln!("error: {e}");
        }
    }
    Ok(code)
}
