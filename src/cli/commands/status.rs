//! status command - Summarize the repository store

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::Context;
use crate::repo::{FileStore, RepositoryState};

/// Print store location, fingerprint and content counts.
pub fn status(ctx: &Context) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let store = FileStore::open(&workspace.store_path)
        .with_context(|| format!("Failed to open store {}", workspace.store_path.display()))?;

    println!("Store: {}", store.path().display());
    match store.saved_at() {
        Some(saved_at) => println!("Saved: {}", saved_at),
        None => println!("Saved: never (built-in state)"),
    }
    for line in summary_lines(store.state()) {
        println!("{}", line);
    }
    Ok(())
}

fn summary_lines(state: &RepositoryState) -> Vec<String> {
    let service_users = state
        .principals
        .values()
        .filter(|p| p.is_system_user())
        .count();
    let disabled = state.principals.values().filter(|p| p.is_disabled()).count();
    let entries: usize = state.acl.values().map(Vec::len).sum();

    vec![
        format!("Revision: {}", state.revision),
        format!("Fingerprint: {}", state.fingerprint().short(12)),
        format!("Nodes: {}", state.nodes.len()),
        format!(
            "Principals: {} ({} service users, {} disabled)",
            state.principals.len(),
            service_users,
            disabled
        ),
        format!(
            "Node types: {} ({} namespaces)",
            state.node_types.len(),
            state.namespaces.len()
        ),
        format!("Access control entries: {}", entries),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_summary() {
        let lines = summary_lines(&RepositoryState::with_builtins());
        assert_eq!(lines[0], "Revision: 0");
        assert!(lines[1].starts_with("Fingerprint: "));
        assert_eq!(lines[2], "Nodes: 1");
        assert!(lines[3].starts_with("Principals: 0"));
    }
}
