//! parse command - Print the operations of a script as JSON

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::script;

/// Parse a script and print its operations.
///
/// The output is a JSON operation list accepted by `apply --json-ops`.
pub fn parse(ctx: &Context, script_path: &Path) -> Result<()> {
    let path = Workspace::load(ctx)?.resolve(script_path);
    let text =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let operations =
        script::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&operations)?);
    Ok(())
}
