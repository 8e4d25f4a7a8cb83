//! engine::nodes
//!
//! Idempotent node creation and mixin maintenance.
//!
//! # Invariants
//!
//! - An existing node is never recreated; it is checked in place against
//!   whatever the operation specified
//! - Missing ancestors get the default primary type
//! - A requested mixin set is exact: extra or missing mixins fail

use super::processor::{Change, OperationError};
use super::verify;
use crate::core::types::{NodePath, QualifiedName};
use crate::repo::Session;

/// Ensure a node exists with the given type and mixins.
///
/// Returns [`Change::Created`] if the target was created, even when its
/// ancestors already existed.
pub fn ensure_node<S: Session + ?Sized>(
    session: &mut S,
    default_type: &QualifiedName,
    path: &NodePath,
    primary_type: Option<&QualifiedName>,
    mixins: Option<&[QualifiedName]>,
) -> Result<Change, OperationError> {
    if session.node_exists(path)? {
        verify::check_node(session, path, primary_type, mixins)?;
        return Ok(Change::Unchanged);
    }

    for ancestor in path.ancestors() {
        if !session.node_exists(&ancestor)? {
            session.add_node(&ancestor, default_type)?;
            tracing::debug!(path = %ancestor, primary_type = %default_type, "created intermediate node");
        }
    }

    let primary_type = primary_type.unwrap_or(default_type);
    session.add_node(path, primary_type)?;
    for mixin in mixins.unwrap_or_default() {
        session.add_mixin(path, mixin)?;
    }
    tracing::debug!(%path, %primary_type, "created node");
    Ok(Change::Created)
}

/// Add mixins to existing nodes.
pub fn add_mixins<S: Session + ?Sized>(
    session: &mut S,
    mixins: &[QualifiedName],
    paths: &[NodePath],
) -> Result<Change, OperationError> {
    require_paths(session, paths)?;
    let mut changed = false;
    for path in paths {
        for mixin in mixins {
            changed |= session.add_mixin(path, mixin)?;
        }
    }
    Ok(if changed {
        Change::Updated
    } else {
        Change::Unchanged
    })
}

/// Remove mixins from existing nodes.
pub fn remove_mixins<S: Session + ?Sized>(
    session: &mut S,
    mixins: &[QualifiedName],
    paths: &[NodePath],
) -> Result<Change, OperationError> {
    require_paths(session, paths)?;
    let mut changed = false;
    for path in paths {
        for mixin in mixins {
            changed |= session.remove_mixin(path, mixin)?;
        }
    }
    Ok(if changed {
        Change::Updated
    } else {
        Change::Unchanged
    })
}

/// Fail on the first path that does not exist.
pub(super) fn require_paths<S: Session + ?Sized>(
    session: &S,
    paths: &[NodePath],
) -> Result<(), OperationError> {
    for path in paths {
        if !session.node_exists(path)? {
            return Err(OperationError::PathNotFound { path: path.clone() });
        }
    }
    Ok(())
}
