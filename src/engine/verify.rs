//! engine::verify
//!
//! Checks of principals and nodes against expectations.
//!
//! # Architecture
//!
//! These checks are shared by three callers:
//!
//! - The node reconciler, which verifies an existing node in place instead
//!   of recreating it
//! - The `repoinit check` command
//! - Tests asserting the outcome of a batch
//!
//! Checks only read. They query the directory or session on every call and
//! never cache.
//!
//! # Example
//!
//! ```
//! use repoinit::core::types::{NodePath, QualifiedName};
//! use repoinit::engine::verify::{check_node, VerifyError};
//! use repoinit::repo::{MemoryRepository, Session};
//!
//! let repo = MemoryRepository::new();
//! let mut session = repo.login();
//! let path = NodePath::new("/a").unwrap();
//! session.add_node(&path, &QualifiedName::new("nt:unstructured").unwrap()).unwrap();
//!
//! let folder = QualifiedName::new("nt:folder").unwrap();
//! let err = check_node(&session, &path, Some(&folder), None).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "Primary type mismatch for /a, expected nt:folder but got nt:unstructured"
//! );
//! ```

use thiserror::Error;

use crate::core::types::{NodePath, PrincipalId, QualifiedName};
use crate::repo::{Principal, PrincipalDirectory, PrincipalKind, RepoError, Session};

/// A failed check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{kind} {id} does not exist")]
    PrincipalMissing { id: PrincipalId, kind: PrincipalKind },

    #[error("principal {id} exists but was expected to be absent")]
    PrincipalPresent { id: PrincipalId },

    #[error("{id} is a {actual}, expected a {expected}")]
    PrincipalKindMismatch {
        id: PrincipalId,
        expected: PrincipalKind,
        actual: PrincipalKind,
    },

    #[error("path {path} of {id} does not contain '{expected}'")]
    PrincipalPathMismatch {
        id: PrincipalId,
        path: NodePath,
        expected: String,
    },

    #[error("{id} is {}, expected {}", state(*.disabled), state(!*.disabled))]
    DisabledStateMismatch { id: PrincipalId, disabled: bool },

    #[error("node {path} does not exist")]
    NodeMissing { path: NodePath },

    #[error("Primary type mismatch for {path}, expected {expected} but got {actual}")]
    PrimaryTypeMismatch {
        path: NodePath,
        expected: QualifiedName,
        actual: QualifiedName,
    },

    #[error("Mixin mismatch for {path}, expected [{}] but got [{}]", join(.expected), join(.actual))]
    MixinMismatch {
        path: NodePath,
        expected: Vec<QualifiedName>,
        actual: Vec<QualifiedName>,
    },

    #[error(transparent)]
    Repository(#[from] RepoError),
}

fn state(disabled: bool) -> &'static str {
    if disabled {
        "disabled"
    } else {
        "enabled"
    }
}

fn join(names: &[QualifiedName]) -> String {
    names
        .iter()
        .map(QualifiedName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expectation for [`check_principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence<'a> {
    /// No principal with the id may exist.
    Absent,
    /// A principal of this kind must exist, optionally with a path
    /// containing the given substring.
    Present {
        kind: PrincipalKind,
        path_contains: Option<&'a str>,
    },
}

/// Check existence, kind and path of a principal.
///
/// A regular-user check fails on a service user and vice versa.
pub fn check_principal<D: PrincipalDirectory + ?Sized>(
    directory: &D,
    id: &PrincipalId,
    expected: Presence<'_>,
) -> Result<Option<Principal>, VerifyError> {
    let found = directory.lookup(id)?;
    match (expected, found) {
        (Presence::Absent, None) => Ok(None),
        (Presence::Absent, Some(_)) => Err(VerifyError::PrincipalPresent { id: id.clone() }),
        (Presence::Present { kind, .. }, None) => Err(VerifyError::PrincipalMissing {
            id: id.clone(),
            kind,
        }),
        (
            Presence::Present {
                kind,
                path_contains,
            },
            Some(principal),
        ) => {
            if principal.kind() != kind {
                return Err(VerifyError::PrincipalKindMismatch {
                    id: id.clone(),
                    expected: kind,
                    actual: principal.kind(),
                });
            }
            if let Some(fragment) = path_contains {
                if !principal.path().as_str().contains(fragment) {
                    return Err(VerifyError::PrincipalPathMismatch {
                        id: id.clone(),
                        path: principal.path().clone(),
                        expected: fragment.to_string(),
                    });
                }
            }
            Ok(Some(principal))
        }
    }
}

/// Check the disabled flag of an existing principal of any kind.
pub fn check_disabled<D: PrincipalDirectory + ?Sized>(
    directory: &D,
    id: &PrincipalId,
    disabled: bool,
) -> Result<(), VerifyError> {
    let principal = directory
        .lookup(id)?
        .ok_or_else(|| VerifyError::PrincipalMissing {
            id: id.clone(),
            kind: PrincipalKind::Regular,
        })?;
    if principal.is_disabled() != disabled {
        return Err(VerifyError::DisabledStateMismatch {
            id: id.clone(),
            disabled: principal.is_disabled(),
        });
    }
    Ok(())
}

/// Check that a node exists with the given primary type and exact mixin set.
///
/// `None` for either expectation means "don't care".
pub fn check_node<S: Session + ?Sized>(
    session: &S,
    path: &NodePath,
    primary_type: Option<&QualifiedName>,
    mixins: Option<&[QualifiedName]>,
) -> Result<(), VerifyError> {
    let node = session
        .node(path)?
        .ok_or_else(|| VerifyError::NodeMissing { path: path.clone() })?;

    if let Some(expected) = primary_type {
        if &node.primary_type != expected {
            return Err(VerifyError::PrimaryTypeMismatch {
                path: path.clone(),
                expected: expected.clone(),
                actual: node.primary_type,
            });
        }
    }

    if let Some(expected) = mixins {
        let same = node.mixins.len() == expected.len()
            && node.mixins.iter().all(|m| expected.contains(m))
            && expected.iter().all(|m| node.mixins.contains(m));
        if !same {
            return Err(VerifyError::MixinMismatch {
                path: path.clone(),
                expected: expected.to_vec(),
                actual: node.mixins,
            });
        }
    }

    Ok(())
}
