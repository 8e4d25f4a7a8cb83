//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves the [`Workspace`] (configuration and store location)
//! 2. Calls the engine or the verification checks
//! 3. Formats and displays output
//!
//! Only `apply` writes the store, and only while holding the store lock.

mod apply;
mod check;
mod completion;
mod parse;
mod status;

pub use apply::apply;
pub use check::check;
pub use completion::completion;
pub use parse::parse;
pub use status::status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::Config;
use crate::ui::output;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Apply {
            scripts,
            json_ops,
            dry_run,
        } => apply(ctx, &scripts, json_ops, dry_run),
        Command::Parse { script } => parse(ctx, &script),
        Command::Status => status(ctx),
        Command::Check { target } => check(ctx, target),
        Command::Completion { shell } => completion(shell),
    }
}

/// Configuration and store location resolved for one command.
#[derive(Debug)]
pub(crate) struct Workspace {
    /// Project directory; relative inputs resolve against it.
    pub dir: PathBuf,
    pub config: Config,
    pub store_path: PathBuf,
}

impl Workspace {
    /// Load configuration for the context's project directory.
    ///
    /// Config warnings are printed; `--store` overrides the configured store.
    pub fn load(ctx: &Context) -> Result<Self> {
        let dir = ctx.project_dir()?;
        let loaded = Config::load(Some(&dir)).context("Failed to load config")?;
        for warning in &loaded.warnings {
            output::warn(
                format!("{} ({})", warning.message, warning.path.display()),
                ctx.verbosity(),
            );
        }

        let config = loaded.config;
        if let Some(path) = config.global_config_loaded_from() {
            output::debug(format!("global config: {}", path.display()), ctx.verbosity());
        }
        if let Some(path) = config.project_config_loaded_from() {
            output::debug(format!("project config: {}", path.display()), ctx.verbosity());
        }

        let store_path = match &ctx.store {
            Some(path) => dir.join(path),
            None => config.store_path(&dir),
        };
        output::debug(format!("store: {}", store_path.display()), ctx.verbosity());

        Ok(Self {
            dir,
            config,
            store_path,
        })
    }

    /// Resolve a command-line path against the project directory.
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        self.dir.join(path)
    }
}
