//! engine::operation
//!
//! The closed set of repoinit directives.
//!
//! # Architecture
//!
//! An [`Operation`] is what the script parser produces and what callers hand
//! to the processor. Operations carry raw strings exactly as written; the
//! processor validates them into typed steps (see [`super::plan`]) before
//! touching the session. This keeps operations cheap to build by hand, from
//! JSON or from the script parser.
//!
//! Operations are immutable once built: the processor borrows them and never
//! rewrites them.
//!
//! # Serialization
//!
//! Operations serialize with an internal `"type"` tag, so a JSON batch reads
//! like:
//!
//! ```json
//! [
//!   { "type": "create_service_user", "id": "svc" },
//!   { "type": "create_node", "path": "/content/site", "primary_type": "sling:Folder" }
//! ]
//! ```
//!
//! An unknown tag fails to decode, so a batch with an unrecognized directive
//! never reaches the processor.
//!
//! # Example
//!
//! ```
//! use repoinit::engine::operation::Operation;
//!
//! let op = Operation::CreateServiceUser { id: "svc".into(), path: None };
//! assert_eq!(op.description(), "create service user svc");
//!
//! let json = serde_json::to_string(&op).unwrap();
//! assert!(json.contains("\"type\":\"create_service_user\""));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repo::AclAction;

/// One `allow`/`deny` line inside a `set ACL` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub action: AclAction,
    pub privileges: Vec<String>,
    pub paths: Vec<String>,
}

/// A repoinit directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Create a regular user.
    CreateUser {
        id: String,
        /// Clear-text password, hashed before it reaches the directory.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        /// Intermediate path, relative to the users root or absolute.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Create a service user.
    CreateServiceUser {
        id: String,
        /// Intermediate path, relative to the users root or absolute.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Delete a user.
    DeleteUser { id: String },

    /// Delete a service user.
    DeleteServiceUser { id: String },

    /// Enable a user or service user.
    EnableUser { id: String },

    /// Disable a user or service user.
    DisableUser {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Ensure a node exists, optionally with a given type and mixin set.
    CreateNode {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_type: Option<String>,
        /// Exact mixin set. `None` means any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mixins: Option<Vec<String>>,
    },

    /// Register a namespace prefix.
    RegisterNamespace { prefix: String, uri: String },

    /// Register node types from an embedded definition block.
    RegisterNodeTypes {
        /// Block text including the marker lines.
        cnd_text: String,
    },

    /// Add mixins to existing nodes.
    AddMixins {
        mixins: Vec<String>,
        paths: Vec<String>,
    },

    /// Remove mixins from existing nodes.
    RemoveMixins {
        mixins: Vec<String>,
        paths: Vec<String>,
    },

    /// Append access control entries for principals.
    SetAcl {
        principals: Vec<String>,
        entries: Vec<AclEntry>,
    },
}

impl Operation {
    /// Short directive name, used as the `op` field in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateUser { .. } => "create_user",
            Operation::CreateServiceUser { .. } => "create_service_user",
            Operation::DeleteUser { .. } => "delete_user",
            Operation::DeleteServiceUser { .. } => "delete_service_user",
            Operation::EnableUser { .. } => "enable_user",
            Operation::DisableUser { .. } => "disable_user",
            Operation::CreateNode { .. } => "create_node",
            Operation::RegisterNamespace { .. } => "register_namespace",
            Operation::RegisterNodeTypes { .. } => "register_node_types",
            Operation::AddMixins { .. } => "add_mixins",
            Operation::RemoveMixins { .. } => "remove_mixins",
            Operation::SetAcl { .. } => "set_acl",
        }
    }

    /// Human description in script syntax.
    ///
    /// Passwords are never included.
    pub fn description(&self) -> String {
        match self {
            Operation::CreateUser { id, path, .. } => with_path(format!("create user {id}"), path),
            Operation::CreateServiceUser { id, path } => {
                with_path(format!("create service user {id}"), path)
            }
            Operation::DeleteUser { id } => format!("delete user {id}"),
            Operation::DeleteServiceUser { id } => format!("delete service user {id}"),
            Operation::EnableUser { id } => format!("enable user {id}"),
            Operation::DisableUser { id, reason } => match reason {
                Some(reason) => format!("disable user {id} : \"{reason}\""),
                None => format!("disable user {id}"),
            },
            Operation::CreateNode {
                path,
                primary_type,
                mixins,
            } => {
                let mut out = format!("create path {path}");
                match (primary_type, mixins) {
                    (Some(ty), Some(m)) => out.push_str(&format!("({ty} mixin {})", m.join(","))),
                    (Some(ty), None) => out.push_str(&format!("({ty})")),
                    (None, Some(m)) => out.push_str(&format!("(mixin {})", m.join(","))),
                    (None, None) => {}
                }
                out
            }
            Operation::RegisterNamespace { prefix, uri } => {
                format!("register namespace ({prefix}) {uri}")
            }
            Operation::RegisterNodeTypes { cnd_text } => {
                let lines = cnd_text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && *l != "<<===" && *l != "===>>")
                    .count();
                format!("register nodetypes ({lines} definition lines)")
            }
            Operation::AddMixins { mixins, paths } => {
                format!("add mixin {} to {}", mixins.join(", "), paths.join(", "))
            }
            Operation::RemoveMixins { mixins, paths } => {
                format!("remove mixin {} from {}", mixins.join(", "), paths.join(", "))
            }
            Operation::SetAcl {
                principals,
                entries,
            } => format!(
                "set ACL for {} ({} entries)",
                principals.join(", "),
                entries.len()
            ),
        }
    }
}

fn with_path(base: String, path: &Option<String>) -> String {
    match path {
        Some(p) => format!("{base} with path {p}"),
        None => base,
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
