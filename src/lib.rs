//! repoinit - Declarative provisioning of hierarchical content repositories
//!
//! A repoinit script describes principals, schema and nodes a content
//! repository must have. This crate parses such scripts and reconciles a
//! repository against them, idempotently and in script order.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`script`] - Script parser producing operations
//! - [`cnd`] - Parser for embedded node type definition blocks
//! - [`engine`] - Validates and applies operation batches
//! - [`repo`] - Session interface, in-memory repository and file store
//! - [`core`] - Domain types, configuration and locking
//! - [`ui`] - Console output
//!
//! # Correctness Invariants
//!
//! repoinit maintains the following invariants:
//!
//! 1. Operations are applied strictly in order through a single dispatch point
//! 2. Applying the same batch twice changes nothing the second time
//! 3. A failed batch is never committed
//! 4. Repository state only changes through a session save

pub mod cli;
pub mod cnd;
pub mod core;
pub mod engine;
pub mod repo;
pub mod script;
pub mod ui;
