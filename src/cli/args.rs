//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--store <file>`: Repository store to use instead of the configured one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// repoinit - Declarative provisioning of content repositories
#[derive(Parser, Debug)]
#[command(name = "repoinit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if repoinit was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Repository store file (overrides the `store` config key)
    #[arg(long, global = true, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply repoinit scripts to the repository store
    #[command(
        name = "apply",
        long_about = "Apply one or more repoinit scripts to the repository store.\n\n\
            All scripts are parsed first and applied in order as a single batch. \
            Operations are idempotent: applying the same scripts twice changes \
            nothing the second time. If any operation fails, the store is left \
            untouched and the failing operation is reported.",
        after_help = "\
EXAMPLES:
    # Apply a script
    repoinit apply init.txt

    # See what would change without writing the store
    repoinit apply --dry-run init.txt

    # Apply operations already encoded as JSON
    repoinit apply --json-ops ops.json"
    )]
    Apply {
        /// Script files, applied in the given order
        #[arg(required = true, value_name = "SCRIPT")]
        scripts: Vec<PathBuf>,

        /// Treat inputs as JSON operation lists instead of scripts
        #[arg(long)]
        json_ops: bool,

        /// Apply to a scratch session and report, without writing the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse a script and print its operations as JSON
    Parse {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
    },

    /// Show a summary of the repository store
    Status,

    /// Check principals and nodes in the repository store
    #[command(
        after_help = "\
EXAMPLES:
    repoinit check service-user reader --path-contains system/app
    repoinit check user alice --absent
    repoinit check disabled bob
    repoinit check node /content --primary-type sling:Folder --mixin mix:title"
    )]
    Check {
        #[command(subcommand)]
        target: CheckTarget,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
INSTALLATION:
    # Bash
    repoinit completion bash > ~/.local/share/bash-completion/completions/repoinit

    # Zsh
    repoinit completion zsh > ~/.zfunc/_repoinit

    # Fish
    repoinit completion fish > ~/.config/fish/completions/repoinit.fish

    # PowerShell
    repoinit completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// What `check` verifies.
#[derive(Subcommand, Debug, Clone)]
pub enum CheckTarget {
    /// A regular user
    User {
        id: String,
        /// Expect the user not to exist
        #[arg(long, conflicts_with = "path_contains")]
        absent: bool,
        /// Expect the user's path to contain this text
        #[arg(long, value_name = "TEXT")]
        path_contains: Option<String>,
    },
    /// A service user
    ServiceUser {
        id: String,
        /// Expect the service user not to exist
        #[arg(long, conflicts_with = "path_contains")]
        absent: bool,
        /// Expect the service user's path to contain this text
        #[arg(long, value_name = "TEXT")]
        path_contains: Option<String>,
    },
    /// A principal that must be disabled
    Disabled { id: String },
    /// A principal that must be enabled
    Enabled { id: String },
    /// A node, optionally with an exact primary type and mixin set
    Node {
        path: String,
        /// Expected primary type
        #[arg(long, value_name = "TYPE")]
        primary_type: Option<String>,
        /// Expected mixin (repeatable); the node must have exactly these
        #[arg(long = "mixin", value_name = "MIXIN")]
        mixins: Vec<String>,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
