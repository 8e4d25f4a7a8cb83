//! engine::plan
//!
//! Batch validation: operations in, typed steps out.
//!
//! # Architecture
//!
//! [`validate_batch`] turns every [`Operation`] of a batch into a [`Step`]
//! before the processor touches the session. A step holds validated types
//! ([`NodePath`], [`QualifiedName`], [`PrincipalId`]) and, for schema
//! registration, the already parsed definition block.
//!
//! # Invariants
//!
//! - Validation does not perform I/O and never sees the session
//! - A batch with any malformed operation is rejected as a whole, so a
//!   rejected batch has made no change
//! - Steps are produced in operation order, one step per operation

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use super::operation::{AclEntry, Operation};
use super::processor::{ApplyError, OperationError};
use crate::cnd::{self, CndDocument};
use crate::core::types::{NodePath, PrincipalId, QualifiedName};
use crate::repo::{AclAction, PrincipalKind};

/// Requested intermediate path of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPath {
    /// Resolved under the users root.
    Relative(String),
    /// Used as-is.
    Absolute(NodePath),
}

/// A validated `allow`/`deny` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAce {
    pub action: AclAction,
    pub privileges: Vec<QualifiedName>,
    pub paths: Vec<NodePath>,
}

/// A validated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CreatePrincipal {
        id: PrincipalId,
        kind: PrincipalKind,
        password_hash: Option<String>,
        path: Option<UserPath>,
    },
    DeletePrincipal {
        id: PrincipalId,
        kind: PrincipalKind,
    },
    SetEnabled {
        id: PrincipalId,
        enabled: bool,
        reason: Option<String>,
    },
    EnsureNode {
        path: NodePath,
        primary_type: Option<QualifiedName>,
        mixins: Option<Vec<QualifiedName>>,
    },
    RegisterNamespace {
        prefix: String,
        uri: String,
    },
    RegisterNodeTypes {
        document: CndDocument,
    },
    AddMixins {
        mixins: Vec<QualifiedName>,
        paths: Vec<NodePath>,
    },
    RemoveMixins {
        mixins: Vec<QualifiedName>,
        paths: Vec<NodePath>,
    },
    SetAcl {
        principals: Vec<PrincipalId>,
        entries: Vec<PlannedAce>,
    },
}

/// Validate a whole batch.
///
/// # Errors
///
/// Returns an [`ApplyError`] for the first malformed operation.
pub fn validate_batch(operations: &[Operation]) -> Result<Vec<Step>, ApplyError> {
    operations
        .iter()
        .enumerate()
        .map(|(index, op)| {
            validate(op).map_err(|source| ApplyError {
                index,
                description: op.description(),
                source,
            })
        })
        .collect()
}

/// Validate a single operation.
pub fn validate(op: &Operation) -> Result<Step, OperationError> {
    let step = match op {
        Operation::CreateUser { id, password, path } => Step::CreatePrincipal {
            id: PrincipalId::new(id.as_str())?,
            kind: PrincipalKind::Regular,
            password_hash: password.as_deref().map(hash_password),
            path: path.as_deref().map(user_path).transpose()?,
        },
        Operation::CreateServiceUser { id, path } => Step::CreatePrincipal {
            id: PrincipalId::new(id.as_str())?,
            kind: PrincipalKind::Service,
            password_hash: None,
            path: path.as_deref().map(user_path).transpose()?,
        },
        Operation::DeleteUser { id } => Step::DeletePrincipal {
            id: PrincipalId::new(id.as_str())?,
            kind: PrincipalKind::Regular,
        },
        Operation::DeleteServiceUser { id } => Step::DeletePrincipal {
            id: PrincipalId::new(id.as_str())?,
            kind: PrincipalKind::Service,
        },
        Operation::EnableUser { id } => Step::SetEnabled {
            id: PrincipalId::new(id.as_str())?,
            enabled: true,
            reason: None,
        },
        Operation::DisableUser { id, reason } => Step::SetEnabled {
            id: PrincipalId::new(id.as_str())?,
            enabled: false,
            reason: reason.clone(),
        },
        Operation::CreateNode {
            path,
            primary_type,
            mixins,
        } => {
            let path = NodePath::new(path.as_str())?;
            if path.is_root() {
                return Err(OperationError::InvalidArgument(
                    "create path needs at least one segment".to_string(),
                ));
            }
            Step::EnsureNode {
                path,
                primary_type: primary_type
                    .as_deref()
                    .map(QualifiedName::new)
                    .transpose()?,
                mixins: mixins.as_deref().map(distinct_names).transpose()?,
            }
        }
        Operation::RegisterNamespace { prefix, uri } => {
            validate_namespace(prefix, uri)?;
            Step::RegisterNamespace {
                prefix: prefix.clone(),
                uri: uri.clone(),
            }
        }
        Operation::RegisterNodeTypes { cnd_text } => {
            let document = cnd::parse(&cnd::extract_block(cnd_text)?)?;
            for ns in &document.namespaces {
                validate_namespace(&ns.prefix, &ns.uri)?;
            }
            Step::RegisterNodeTypes { document }
        }
        Operation::AddMixins { mixins, paths } => Step::AddMixins {
            mixins: non_empty("mixin", distinct_names(mixins)?)?,
            paths: non_empty("path", node_paths(paths)?)?,
        },
        Operation::RemoveMixins { mixins, paths } => Step::RemoveMixins {
            mixins: non_empty("mixin", distinct_names(mixins)?)?,
            paths: non_empty("path", node_paths(paths)?)?,
        },
        Operation::SetAcl {
            principals,
            entries,
        } => Step::SetAcl {
            principals: non_empty(
                "principal",
                principals
                    .iter()
                    .map(|p| PrincipalId::new(p.as_str()))
                    .collect::<Result<_, _>>()?,
            )?,
            entries: non_empty(
                "access control entry",
                entries.iter().map(ace).collect::<Result<_, _>>()?,
            )?,
        },
    };
    Ok(step)
}

/// SHA-256 hex digest of a password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn user_path(raw: &str) -> Result<UserPath, OperationError> {
    if raw.starts_with('/') {
        return Ok(UserPath::Absolute(NodePath::new(raw)?));
    }
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(OperationError::InvalidArgument(
            "user path cannot be empty".to_string(),
        ));
    }
    // Same segment rules as absolute paths.
    NodePath::root().join(trimmed)?;
    Ok(UserPath::Relative(trimmed.to_string()))
}

fn names(raw: &[String]) -> Result<Vec<QualifiedName>, OperationError> {
    raw.iter()
        .map(|n| QualifiedName::new(n.as_str()).map_err(OperationError::from))
        .collect()
}

/// Like [`names`], dropping repeats and keeping first-seen order.
fn distinct_names(raw: &[String]) -> Result<Vec<QualifiedName>, OperationError> {
    let mut seen = BTreeSet::new();
    Ok(names(raw)?
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .collect())
}

fn node_paths(raw: &[String]) -> Result<Vec<NodePath>, OperationError> {
    raw.iter()
        .map(|p| NodePath::new(p.as_str()).map_err(OperationError::from))
        .collect()
}

fn ace(entry: &AclEntry) -> Result<PlannedAce, OperationError> {
    Ok(PlannedAce {
        action: entry.action,
        privileges: non_empty("privilege", names(&entry.privileges)?)?,
        paths: non_empty("path", node_paths(&entry.paths)?)?,
    })
}

fn non_empty<T>(what: &str, items: Vec<T>) -> Result<Vec<T>, OperationError> {
    if items.is_empty() {
        Err(OperationError::InvalidArgument(format!(
            "at least one {what} is required"
        )))
    } else {
        Ok(items)
    }
}

fn validate_namespace(prefix: &str, uri: &str) -> Result<(), OperationError> {
    if prefix.is_empty()
        || prefix
            .chars()
            .any(|c| c == ':' || c.is_whitespace() || c.is_control())
    {
        return Err(OperationError::InvalidArgument(format!(
            "invalid namespace prefix '{prefix}'"
        )));
    }
    if uri.trim().is_empty() {
        return Err(OperationError::InvalidArgument(format!(
            "namespace '{prefix}' needs a uri"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnd::CndError;

    #[test]
    fn one_step_per_operation() {
        let ops = vec![
            Operation::CreateServiceUser {
                id: "svc".into(),
                path: Some("system/app".into()),
            },
            Operation::CreateNode {
                path: "/content".into(),
                primary_type: None,
                mixins: None,
            },
        ];
        let steps = validate_batch(&ops).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(
            &steps[0],
            Step::CreatePrincipal {
                kind: PrincipalKind::Service,
                path: Some(UserPath::Relative(p)),
                ..
            } if p == "system/app"
        ));
    }

    #[test]
    fn repeated_mixins_collapse_in_order() {
        let step = validate(&Operation::CreateNode {
            path: "/a".into(),
            primary_type: None,
            mixins: Some(vec![
                "mix:title".into(),
                "mix:created".into(),
                "mix:title".into(),
            ]),
        })
        .unwrap();
        let Step::EnsureNode {
            mixins: Some(mixins),
            ..
        } = &step
        else {
            panic!("expected EnsureNode with mixins, got {step:?}");
        };
        let mixins: Vec<&str> = mixins.iter().map(QualifiedName::as_str).collect();
        assert_eq!(mixins, ["mix:title", "mix:created"]);
    }

    #[test]
    fn first_bad_operation_is_reported() {
        let ops = vec![
            Operation::DeleteUser { id: "ok".into() },
            Operation::DeleteUser { id: "".into() },
            Operation::DeleteUser { id: "a b".into() },
        ];
        let err = validate_batch(&ops).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, OperationError::Type(_)));
    }

    #[test]
    fn password_is_hashed() {
        let step = validate(&Operation::CreateUser {
            id: "alice".into(),
            password: Some("secret".into()),
            path: None,
        })
        .unwrap();
        let Step::CreatePrincipal { password_hash, .. } = step else {
            panic!("expected create step");
        };
        let hash = password_hash.unwrap();
        assert_ne!(hash, "secret");
        assert_eq!(hash, hash_password("secret"));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn node_shapes() {
        assert!(validate(&Operation::CreateNode {
            path: "relative".into(),
            primary_type: None,
            mixins: None,
        })
        .is_err());
        assert!(validate(&Operation::CreateNode {
            path: "/".into(),
            primary_type: None,
            mixins: None,
        })
        .is_err());
        assert!(validate(&Operation::CreateNode {
            path: "/a".into(),
            primary_type: Some("folder".into()),
            mixins: None,
        })
        .is_err());
    }

    #[test]
    fn empty_lists_rejected() {
        assert!(validate(&Operation::AddMixins {
            mixins: vec![],
            paths: vec!["/a".into()],
        })
        .is_err());
        assert!(validate(&Operation::SetAcl {
            principals: vec!["svc".into()],
            entries: vec![],
        })
        .is_err());
    }

    #[test]
    fn cnd_problems_surface_before_apply() {
        let err = validate(&Operation::RegisterNodeTypes {
            cnd_text: "<ns='uri'>\n[ns:foo]".into(),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            OperationError::Cnd(CndError::MissingStartMarker)
        ));
    }

    #[test]
    fn user_paths() {
        assert_eq!(
            user_path("/home/users/x").unwrap(),
            UserPath::Absolute(NodePath::new("/home/users/x").unwrap())
        );
        assert_eq!(
            user_path("team/").unwrap(),
            UserPath::Relative("team".to_string())
        );
        assert!(user_path("a/../b").is_err());
        assert!(user_path("/").is_ok());
        assert!(user_path("").is_err());
    }
}
