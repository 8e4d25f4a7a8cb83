//! engine::processor
//!
//! The single dispatch point for operation batches.
//!
//! # Architecture
//!
//! [`OpsProcessor::apply`] runs a batch against one session:
//!
//! 1. **Validate**: every operation becomes a typed [`Step`] via
//!    [`validate_batch`]. A malformed operation aborts the batch before any
//!    change is made.
//! 2. **Dispatch**: steps run strictly in order, each through exactly one
//!    reconciler chosen by exhaustive match.
//! 3. **Stop on failure**: the first failing step ends the batch. Later
//!    operations never run; earlier changes stay pending in the session.
//!
//! # Invariants
//!
//! - The processor never calls [`Session::save`]; committing is the caller's
//!   decision
//! - Repository errors are propagated verbatim inside [`OperationError`]
//! - Every error names the failing operation's index and description
//!
//! # Example
//!
//! ```
//! use repoinit::engine::operation::Operation;
//! use repoinit::engine::processor::{OpsProcessor, ProcessorOptions};
//! use repoinit::repo::{MemoryRepository, Session};
//!
//! let repo = MemoryRepository::new();
//! let mut session = repo.login();
//! let processor = OpsProcessor::new(ProcessorOptions::default());
//!
//! let ops = vec![Operation::CreateServiceUser { id: "svc".into(), path: None }];
//! let report = processor.apply(&mut session, &ops).unwrap();
//! assert_eq!(report.changed(), 1);
//!
//! // Nothing is visible until the caller saves.
//! assert_eq!(repo.revision(), 0);
//! session.save().unwrap();
//! assert_eq!(repo.revision(), 1);
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::operation::Operation;
use super::plan::{validate_batch, Step};
use super::principals::DirectoryLayout;
use super::verify::VerifyError;
use super::{acl, nodes, nodetypes, principals};
use crate::cnd::CndError;
use crate::core::types::{NodePath, PrincipalId, QualifiedName, TypeError};
use crate::repo::{PrincipalKind, RepoError, Session};

/// Errors from a single operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A value failed type validation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// An argument is structurally invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// The embedded definition block is malformed.
    #[error("invalid node type definitions")]
    Cnd(#[from] CndError),

    /// The repository rejected a call.
    #[error(transparent)]
    Repository(#[from] RepoError),

    /// An existing item does not match the requested one.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// A principal exists with the other kind.
    #[error("{id} already exists as a {actual}, cannot create it as a {requested}")]
    KindMismatch {
        id: PrincipalId,
        requested: PrincipalKind,
        actual: PrincipalKind,
    },

    /// A principal path falls outside its kind's root.
    #[error("{kind} {id} cannot be placed at {path}: {reason}")]
    PathOutsideRoot {
        id: PrincipalId,
        kind: PrincipalKind,
        path: NodePath,
        reason: String,
    },

    /// The operation refers to a principal that does not exist.
    #[error("principal not found: {id}")]
    PrincipalNotFound { id: PrincipalId },

    /// The operation refers to a node that does not exist.
    #[error("path not found: {path}")]
    PathNotFound { path: NodePath },
}

/// A failed batch.
///
/// Carries the zero-based index of the failing operation and its
/// description; later operations were not applied. The cause is exposed
/// through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("operation #{} ({description}) failed", .index + 1)]
pub struct ApplyError {
    pub index: usize,
    pub description: String,
    pub source: OperationError,
}

/// What one operation did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Removed,
    Updated,
    /// The repository already satisfied the operation.
    Unchanged,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Change::Created => "created",
            Change::Removed => "removed",
            Change::Updated => "updated",
            Change::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Outcome of one applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub description: String,
    pub change: Change,
}

/// Outcomes of a successful batch, in operation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<Outcome>,
}

impl ApplyReport {
    /// Number of operations that changed the session.
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.change != Change::Unchanged)
            .count()
    }

    /// True if the batch left the session as it found it.
    pub fn is_noop(&self) -> bool {
        self.changed() == 0
    }
}

/// Settings shared by all reconcilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Where principals live.
    pub layout: DirectoryLayout,
    /// Type for created nodes that do not name one.
    pub default_primary_type: QualifiedName,
}

impl ProcessorOptions {
    pub const DEFAULT_PRIMARY_TYPE: &'static str = "nt:unstructured";
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            layout: DirectoryLayout::default(),
            default_primary_type: QualifiedName::from_static(Self::DEFAULT_PRIMARY_TYPE),
        }
    }
}

/// Applies operation batches to sessions.
#[derive(Debug, Clone, Default)]
pub struct OpsProcessor {
    options: ProcessorOptions,
}

impl OpsProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Apply a batch in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] naming the first operation that failed
    /// validation or could not be applied. Changes made by earlier
    /// operations remain pending in `session`.
    pub fn apply<S: Session + ?Sized>(
        &self,
        session: &mut S,
        operations: &[Operation],
    ) -> Result<ApplyReport, ApplyError> {
        let steps = validate_batch(operations)?;

        let mut report = ApplyReport::default();
        for (index, (op, step)) in operations.iter().zip(&steps).enumerate() {
            tracing::debug!(index, op = op.kind(), "applying operation");

            let change = self
                .dispatch(session, step)
                .map_err(|source| {
                    tracing::debug!(index, op = op.kind(), error = %source, "operation failed");
                    ApplyError {
                        index,
                        description: op.description(),
                        source,
                    }
                })?;

            report.outcomes.push(Outcome {
                index,
                description: op.description(),
                change,
            });
        }

        tracing::info!(
            operations = operations.len(),
            changed = report.changed(),
            "batch applied"
        );
        Ok(report)
    }

    fn dispatch<S: Session + ?Sized>(
        &self,
        session: &mut S,
        step: &Step,
    ) -> Result<Change, OperationError> {
        match step {
            Step::CreatePrincipal {
                id,
                kind,
                password_hash,
                path,
            } => principals::create(
                session,
                &self.options.layout,
                id,
                *kind,
                password_hash.as_deref(),
                path.as_ref(),
            ),
            Step::DeletePrincipal { id, kind } => principals::delete(session, id, *kind),
            Step::SetEnabled {
                id,
                enabled,
                reason,
            } => principals::set_enabled(session, id, *enabled, reason.as_deref()),
            Step::EnsureNode {
                path,
                primary_type,
                mixins,
            } => nodes::ensure_node(
                session,
                &self.options.default_primary_type,
                path,
                primary_type.as_ref(),
                mixins.as_deref(),
            ),
            Step::RegisterNamespace { prefix, uri } => {
                nodetypes::register_namespace(session, prefix, uri)
            }
            Step::RegisterNodeTypes { document } => {
                nodetypes::register_node_types(session, document)
            }
            Step::AddMixins { mixins, paths } => nodes::add_mixins(session, mixins, paths),
            Step::RemoveMixins { mixins, paths } => nodes::remove_mixins(session, mixins, paths),
            Step::SetAcl {
                principals,
                entries,
            } => acl::set_acl(session, principals, entries),
        }
    }
}
