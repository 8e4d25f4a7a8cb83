//! ui
//!
//! User-facing console output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All CLI output goes through this module so the quiet and debug flags
//! are honored in one place. Library code never prints; it logs through
//! `tracing` instead.

pub mod output;
