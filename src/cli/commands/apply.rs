//! apply command - Apply repoinit scripts to the repository store
//!
//! # Flow
//!
//! 1. Parse every input (scripts, or JSON operation lists with `--json-ops`)
//! 2. Lock the store and load it into a memory repository
//! 3. Apply all operations as one batch through a single session
//! 4. Save the session and write the store
//!
//! A parse or apply failure ends the command before step 4, so the store
//! file is never left half-updated. `--dry-run` skips the lock and step 4.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::core::lock::StoreLock;
use crate::engine::{Operation, OpsProcessor};
use crate::repo::{FileStore, Session};
use crate::script;
use crate::ui::output;

/// Apply scripts in order as a single batch.
pub fn apply(ctx: &Context, inputs: &[PathBuf], json_ops: bool, dry_run: bool) -> Result<()> {
    let verbosity = ctx.verbosity();
    let workspace = Workspace::load(ctx)?;
    let options = workspace
        .config
        .processor_options()
        .context("Invalid configuration")?;

    let mut operations = Vec::new();
    for input in inputs {
        let path = workspace.resolve(input);
        let parsed = read_operations(&path, json_ops)?;
        output::debug(
            format!("{}: {} operations", path.display(), parsed.len()),
            verbosity,
        );
        operations.extend(parsed);
    }

    let _lock = if dry_run {
        None
    } else {
        Some(StoreLock::acquire(&workspace.store_path).context("Failed to lock repository store")?)
    };

    let mut store = FileStore::open(&workspace.store_path).with_context(|| {
        format!("Failed to open store {}", workspace.store_path.display())
    })?;
    let repository = store.repository();
    let mut session = repository.login();
    output::debug(format!("session {}", session.id()), verbosity);

    let report = OpsProcessor::new(options)
        .apply(&mut session, &operations)
        .context("Nothing was written")?;
    output::print(output::format_report(&report), verbosity);

    if dry_run {
        output::debug(
            format!(
                "fingerprint after batch: {}",
                session.working_state().fingerprint().short(12)
            ),
            verbosity,
        );
        output::print(
            format!("dry run, store not written: {}", output::format_summary(&report)),
            verbosity,
        );
        return Ok(());
    }

    if session.has_pending_changes() {
        session.save().context("Failed to save session")?;
        store
            .write(repository.snapshot())
            .with_context(|| format!("Failed to write store {}", store.path().display()))?;
    }
    output::print(output::format_summary(&report), verbosity);
    Ok(())
}

/// Read one input file as a script or as a JSON operation list.
fn read_operations(path: &Path, json_ops: bool) -> Result<Vec<Operation>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if json_ops {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid operation list in {}", path.display()))
    } else {
        script::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
