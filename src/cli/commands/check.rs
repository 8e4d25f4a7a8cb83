//! check command - Verify principals and nodes in the repository store
//!
//! Each check reads the store through a fresh session and runs one
//! [`crate::engine::verify`] check. A failed check is an error, so the
//! process exits non-zero.

use anyhow::{Context as _, Result};

use super::Workspace;
use crate::cli::args::CheckTarget;
use crate::cli::Context;
use crate::core::types::{NodePath, PrincipalId, QualifiedName};
use crate::engine::verify::{self, Presence};
use crate::repo::{FileStore, MemorySession, PrincipalKind};
use crate::ui::output;

/// Run one check against the store.
pub fn check(ctx: &Context, target: CheckTarget) -> Result<()> {
    let workspace = Workspace::load(ctx)?;
    let store = FileStore::open(&workspace.store_path)
        .with_context(|| format!("Failed to open store {}", workspace.store_path.display()))?;
    let session = store.repository().login();

    let message = match target {
        CheckTarget::User {
            id,
            absent,
            path_contains,
        } => principal(&session, &id, PrincipalKind::Regular, absent, path_contains)?,
        CheckTarget::ServiceUser {
            id,
            absent,
            path_contains,
        } => principal(&session, &id, PrincipalKind::Service, absent, path_contains)?,
        CheckTarget::Disabled { id } => {
            verify::check_disabled(&session, &PrincipalId::new(id.as_str())?, true)?;
            format!("{id} is disabled")
        }
        CheckTarget::Enabled { id } => {
            verify::check_disabled(&session, &PrincipalId::new(id.as_str())?, false)?;
            format!("{id} is enabled")
        }
        CheckTarget::Node {
            path,
            primary_type,
            mixins,
        } => {
            let node_path = NodePath::new(path.as_str())?;
            let primary_type = primary_type
                .as_deref()
                .map(QualifiedName::new)
                .transpose()?;
            let mixins = mixins
                .iter()
                .map(|m| QualifiedName::new(m.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            let expected_mixins = (!mixins.is_empty()).then_some(mixins.as_slice());
            verify::check_node(&session, &node_path, primary_type.as_ref(), expected_mixins)?;
            format!("node {path} matches")
        }
    };

    output::print(format!("ok: {message}"), ctx.verbosity());
    Ok(())
}

fn principal(
    session: &MemorySession,
    id: &str,
    kind: PrincipalKind,
    absent: bool,
    path_contains: Option<String>,
) -> Result<String> {
    let principal_id = PrincipalId::new(id)?;
    let expected = if absent {
        Presence::Absent
    } else {
        Presence::Present {
            kind,
            path_contains: path_contains.as_deref(),
        }
    };

    let found = verify::check_principal(session, &principal_id, expected)?;
    Ok(match found {
        Some(p) => format!("{kind} {id} exists at {}", p.path()),
        None => format!("{id} does not exist"),
    })
}
