//! repo
//!
//! Repository boundary and the bundled drivers.
//!
//! # Architecture
//!
//! - [`interface`] - The [`Session`] and [`PrincipalDirectory`] traits the
//!   engine is written against
//! - [`memory`] - In-memory driver with per-session working copies
//! - [`store`] - JSON file persistence for the memory driver
//! - [`builtin`] - Namespaces, node types and privileges present in every
//!   fresh repository

pub mod builtin;
pub mod interface;
pub mod memory;
pub mod store;

pub use interface::{
    AccessControlEntry, Account, AclAction, ItemDefinition, NewPrincipal, Node,
    NodeTypeDefinition, Principal, PrincipalDirectory, PrincipalKind, Registration, RepoError,
    Session,
};
pub use memory::{MemoryRepository, MemorySession, NodeRecord, RepositoryState};
pub use store::{FileStore, StoreDocument, StoreError};
