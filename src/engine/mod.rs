//! engine
//!
//! Applies operation batches: Validate -> Dispatch -> Report.
//!
//! # Architecture
//!
//! The engine is the only part of the crate that changes repository state.
//! Everything it does flows through one [`Session`](crate::repo::Session):
//!
//! 1. **Validate**: [`plan::validate_batch`] turns [`Operation`]s into typed
//!    steps. Nothing is touched if any operation is malformed.
//! 2. **Dispatch**: [`OpsProcessor`] routes each step to its reconciler:
//!    [`principals`], [`nodes`], [`nodetypes`] or [`acl`].
//! 3. **Report**: every applied operation yields an [`Outcome`]; the first
//!    failure yields an [`ApplyError`] and ends the batch.
//!
//! Committing is not part of the engine. The caller saves the session when
//! it is satisfied with the report.
//!
//! # Invariants
//!
//! - Operations run strictly in input order
//! - Reconcilers are idempotent: a batch applied twice changes nothing the
//!   second time
//! - Reconcilers query the repository on every call and never cache
//! - Repository errors reach the caller unmodified
//!
//! # Example
//!
//! ```
//! use repoinit::engine::{Change, Operation, OpsProcessor};
//! use repoinit::repo::{MemoryRepository, Session};
//!
//! let repo = MemoryRepository::new();
//! let mut session = repo.login();
//! let ops = vec![
//!     Operation::CreateServiceUser { id: "reader".into(), path: None },
//!     Operation::CreateNode {
//!         path: "/content".into(),
//!         primary_type: Some("sling:Folder".into()),
//!         mixins: None,
//!     },
//! ];
//!
//! let report = OpsProcessor::default().apply(&mut session, &ops).unwrap();
//! assert!(report.outcomes.iter().all(|o| o.change == Change::Created));
//! session.save().unwrap();
//! ```

pub mod acl;
pub mod nodes;
pub mod nodetypes;
pub mod operation;
pub mod plan;
pub mod principals;
pub mod processor;
pub mod verify;

pub use operation::{AclEntry, Operation};
pub use plan::{validate_batch, PlannedAce, Step, UserPath};
pub use principals::DirectoryLayout;
pub use processor::{
    ApplyError, ApplyReport, Change, OperationError, OpsProcessor, Outcome, ProcessorOptions,
};
pub use verify::VerifyError;
