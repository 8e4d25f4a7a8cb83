//! core
//!
//! Core domain types, configuration and locking for repoinit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: NodePath, QualifiedName, PrincipalId, etc.
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Exclusive lock on a persisted store
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod config;
pub mod lock;
pub mod types;
