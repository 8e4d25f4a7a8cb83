//! engine::acl
//!
//! Access control entries from `set ACL` blocks.
//!
//! Entries are stored, not evaluated. Every principal and every path must
//! exist when the block runs, which is what makes script order matter: a
//! `set ACL` for a service user must come after the user's creation.

use super::nodes::require_paths;
use super::plan::PlannedAce;
use super::processor::{Change, OperationError};
use crate::core::types::PrincipalId;
use crate::repo::{AccessControlEntry, Session};

/// Append entries for each principal on each listed path.
///
/// All principals and paths are checked before anything is written.
pub fn set_acl<S: Session + ?Sized>(
    session: &mut S,
    principals: &[PrincipalId],
    entries: &[PlannedAce],
) -> Result<Change, OperationError> {
    for id in principals {
        if session.lookup(id)?.is_none() {
            return Err(OperationError::PrincipalNotFound { id: id.clone() });
        }
    }
    for entry in entries {
        require_paths(session, &entry.paths)?;
    }

    let mut added = 0usize;
    for principal in principals {
        for entry in entries {
            for path in &entry.paths {
                let ace = AccessControlEntry {
                    principal: principal.clone(),
                    action: entry.action,
                    privileges: entry.privileges.clone(),
                };
                if session.add_access_control_entry(path, ace)? {
                    added += 1;
                }
            }
        }
    }

    tracing::debug!(principals = principals.len(), added, "access control entries");
    Ok(if added > 0 {
        Change::Updated
    } else {
        Change::Unchanged
    })
}
