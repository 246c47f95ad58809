//! cli
//!
//! Command-line interface layer for pushgate.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve configuration (file, then flags)
//! - Delegate to command handlers
//!
//! Logging is initialized by `main.rs` before [`run`] is called.

pub mod args;
pub mod commands;

pub use args::{AutoswapAction, Cli, Command, RepoAction};

use anyhow::{Context as _, Result};

use crate::core::config::Config;

/// Shared inputs for command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub debug: bool,
}

/// Run the CLI application with already-parsed arguments.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    let ctx = Context {
        config,
        debug: cli.debug,
    };
    commands::dispatch(cli.command, &ctx)
}
