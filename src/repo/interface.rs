//! repo::interface
//!
//! The boundary between the operation processor and a live repository.
//!
//! This module provides the **single doorway** to repository state. The
//! processor only ever talks to a [`Session`], which bundles node access,
//! schema registration, access control and the [`PrincipalDirectory`].
//! Every call is fallible and failures are reported as [`RepoError`],
//! which the processor propagates verbatim.
//!
//! # Ownership
//!
//! A session is exclusively borrowed (`&mut`) for the duration of one
//! batch. Changes accumulate in the session until [`Session::save`] is
//! called by the caller; the processor never saves.
//!
//! # Example
//!
//! ```
//! use repoinit::core::types::{NodePath, QualifiedName};
//! use repoinit::repo::{MemoryRepository, Session};
//!
//! let repo = MemoryRepository::new();
//! let mut session = repo.login();
//!
//! let path = NodePath::new("/content").unwrap();
//! let ty = QualifiedName::new("nt:unstructured").unwrap();
//! session.add_node(&path, &ty).unwrap();
//! assert!(session.has_pending_changes());
//!
//! session.save().unwrap();
//! assert!(repo.login().node_exists(&path).unwrap());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{NodePath, PrincipalId, QualifiedName, UtcTimestamp};

/// Errors from repository operations.
///
/// These cover the failure categories the reconcilers need to tell
/// apart. Anything a driver cannot classify goes to [`RepoError::Internal`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// No node at the given path.
    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    /// A node already exists at the given path.
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// The parent of a node to be added does not exist.
    #[error("parent node does not exist for {path}")]
    ParentMissing { path: String },

    /// The named node type is not registered.
    #[error("no such node type: {name}")]
    NoSuchNodeType { name: String },

    /// A mixin type was used as a primary type.
    #[error("{name} is a mixin type and cannot be used as a primary type")]
    MixinAsPrimary { name: String },

    /// A primary type was used as a mixin.
    #[error("{name} is not a mixin type")]
    NotAMixin { name: String },

    /// Nodes cannot be created with an abstract type.
    #[error("{name} is abstract and cannot be instantiated")]
    AbstractNodeType { name: String },

    /// A name uses a prefix with no registered namespace.
    #[error("namespace prefix '{prefix}' is not registered")]
    UnknownNamespace { prefix: String },

    /// A prefix is already mapped to another URI.
    #[error("namespace prefix '{prefix}' is mapped to {existing}, cannot remap to {requested}")]
    NamespaceConflict {
        /// The prefix being registered
        prefix: String,
        /// Currently registered URI
        existing: String,
        /// URI requested by the caller
        requested: String,
    },

    /// A node type definition conflicts with the registered one.
    #[error("node type {name} conflicts with existing definition: registered {existing}, requested {requested}")]
    NodeTypeConflict {
        /// The node type name
        name: String,
        /// Summary of the registered definition
        existing: String,
        /// Summary of the requested definition
        requested: String,
    },

    /// A node type definition is internally inconsistent.
    #[error("invalid node type {name}: {reason}")]
    InvalidNodeType { name: String, reason: String },

    /// The privilege is not known to the repository.
    #[error("unknown privilege: {name}")]
    UnknownPrivilege { name: String },

    /// A principal with this id already exists.
    #[error("principal already exists: {id}")]
    PrincipalExists { id: String },

    /// No principal with this id exists.
    #[error("principal not found: {id}")]
    PrincipalNotFound { id: String },

    /// The session's base revision is stale; another session saved first.
    #[error("save conflict: session based on revision {base}, repository is at revision {current}")]
    Conflict { base: u64, current: u64 },

    /// Driver failure with no finer classification.
    #[error("repository error: {0}")]
    Internal(String),
}

/// A node as seen through a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute path of the node.
    pub path: NodePath,
    /// Value of the node's primary type property.
    pub primary_type: QualifiedName,
    /// Mixin types in the order they were added.
    pub mixins: Vec<QualifiedName>,
}

impl Node {
    /// Check whether the node carries a given mixin.
    pub fn has_mixin(&self, mixin: &QualifiedName) -> bool {
        self.mixins.contains(mixin)
    }
}

/// Principal kind.
///
/// A service user is a non-interactive system principal; a regular user
/// can log in. The two kinds are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Regular,
    Service,
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalKind::Regular => write!(f, "user"),
            PrincipalKind::Service => write!(f, "service user"),
        }
    }
}

/// Account data shared by both principal kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique id within the directory.
    pub id: PrincipalId,
    /// Location of the principal in the user tree.
    pub path: NodePath,
    /// Whether login is disabled.
    pub disabled: bool,
    /// Reason recorded when the principal was disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    /// SHA-256 hex digest of the password, regular users only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Creation time.
    pub created_at: UtcTimestamp,
}

/// A principal stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Regular(Account),
    Service(Account),
}

impl Principal {
    /// The shared account data.
    pub fn account(&self) -> &Account {
        match self {
            Principal::Regular(account) | Principal::Service(account) => account,
        }
    }

    pub(crate) fn account_mut(&mut self) -> &mut Account {
        match self {
            Principal::Regular(account) | Principal::Service(account) => account,
        }
    }

    /// The principal's kind tag.
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Regular(_) => PrincipalKind::Regular,
            Principal::Service(_) => PrincipalKind::Service,
        }
    }

    pub fn id(&self) -> &PrincipalId {
        &self.account().id
    }

    pub fn path(&self) -> &NodePath {
        &self.account().path
    }

    /// True for service users.
    pub fn is_system_user(&self) -> bool {
        matches!(self, Principal::Service(_))
    }

    pub fn is_disabled(&self) -> bool {
        self.account().disabled
    }
}

/// Request to create a principal.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub id: PrincipalId,
    pub kind: PrincipalKind,
    /// Full path of the principal, already resolved by the caller.
    pub path: NodePath,
    pub password_hash: Option<String>,
}

/// Capability interface over the user directory.
///
/// The directory is the source of truth for principal existence. Callers
/// query it every time rather than caching lookups.
pub trait PrincipalDirectory {
    /// Look up a principal by id.
    fn lookup(&self, id: &PrincipalId) -> Result<Option<Principal>, RepoError>;

    /// Create a principal.
    ///
    /// Fails with [`RepoError::PrincipalExists`] if the id is taken.
    fn create(&mut self, principal: NewPrincipal) -> Result<Principal, RepoError>;

    /// Remove a principal.
    ///
    /// Fails with [`RepoError::PrincipalNotFound`] if the id is absent.
    fn delete(&mut self, id: &PrincipalId) -> Result<(), RepoError>;

    /// Enable or disable a principal, recording an optional reason.
    ///
    /// Fails with [`RepoError::PrincipalNotFound`] if the id is absent.
    fn set_enabled(
        &mut self,
        id: &PrincipalId,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), RepoError>;
}

/// A property or child node definition inside a node type.
///
/// Only the parts needed for compatibility checks are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Item name, or `*` for residual definitions.
    pub name: String,
    /// Declared type in parentheses, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_type: Option<String>,
    /// Remaining attribute tokens (`mandatory`, `multiple`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

/// A node type definition as registered with the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDefinition {
    pub name: QualifiedName,
    pub supertypes: Vec<QualifiedName>,
    #[serde(default)]
    pub mixin: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub orderable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ItemDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ItemDefinition>,
}

impl NodeTypeDefinition {
    /// A primary type with the given supertypes.
    pub fn primary(name: QualifiedName, supertypes: Vec<QualifiedName>) -> Self {
        Self {
            name,
            supertypes,
            mixin: false,
            is_abstract: false,
            orderable: false,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A mixin type with the given supertypes.
    pub fn mixin(name: QualifiedName, supertypes: Vec<QualifiedName>) -> Self {
        Self {
            mixin: true,
            ..Self::primary(name, supertypes)
        }
    }

    /// Short human summary, e.g. `[ns:foo] > nt:unstructured mixin`.
    pub fn summary(&self) -> String {
        let mut out = format!("[{}]", self.name);
        if !self.supertypes.is_empty() {
            let supers: Vec<&str> = self.supertypes.iter().map(|s| s.as_str()).collect();
            out.push_str(" > ");
            out.push_str(&supers.join(", "));
        }
        if self.mixin {
            out.push_str(" mixin");
        }
        if self.is_abstract {
            out.push_str(" abstract");
        }
        out
    }
}

/// Outcome of registering one schema item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The item was not known before.
    Registered,
    /// A compatible definition replaced the registered one.
    Updated,
    /// An identical definition was already registered.
    Unchanged,
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    Allow,
    Deny,
}

impl std::fmt::Display for AclAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AclAction::Allow => write!(f, "allow"),
            AclAction::Deny => write!(f, "deny"),
        }
    }
}

/// One access control entry stored on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub principal: PrincipalId,
    pub action: AclAction,
    pub privileges: Vec<QualifiedName>,
}

/// A session against a live repository.
///
/// All mutating calls change only the session's pending state until
/// [`Session::save`] persists them.
pub trait Session: PrincipalDirectory {
    /// Read a node.
    fn node(&self, path: &NodePath) -> Result<Option<Node>, RepoError>;

    /// Check node existence.
    fn node_exists(&self, path: &NodePath) -> Result<bool, RepoError> {
        Ok(self.node(path)?.is_some())
    }

    /// Add a node below an existing parent.
    fn add_node(&mut self, path: &NodePath, primary_type: &QualifiedName)
        -> Result<Node, RepoError>;

    /// Add a mixin; returns `false` if it was already present.
    fn add_mixin(&mut self, path: &NodePath, mixin: &QualifiedName) -> Result<bool, RepoError>;

    /// Remove a mixin; returns `false` if it was not present.
    fn remove_mixin(&mut self, path: &NodePath, mixin: &QualifiedName)
        -> Result<bool, RepoError>;

    /// URI registered for a namespace prefix.
    fn namespace_uri(&self, prefix: &str) -> Result<Option<String>, RepoError>;

    /// Register a prefix → URI mapping.
    fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<Registration, RepoError>;

    /// Read a registered node type.
    fn node_type(&self, name: &QualifiedName) -> Result<Option<NodeTypeDefinition>, RepoError>;

    /// Register node type definitions as one unit.
    ///
    /// The repository validates prefixes, supertypes and conflicts with
    /// already registered types. On error nothing is registered.
    fn register_node_types(
        &mut self,
        definitions: &[NodeTypeDefinition],
    ) -> Result<Vec<(QualifiedName, Registration)>, RepoError>;

    /// Append an access control entry to a node's policy; returns `false`
    /// if an identical entry already exists.
    fn add_access_control_entry(
        &mut self,
        path: &NodePath,
        entry: AccessControlEntry,
    ) -> Result<bool, RepoError>;

    /// Entries of a node's policy in insertion order.
    fn access_control_entries(&self, path: &NodePath)
        -> Result<Vec<AccessControlEntry>, RepoError>;

    /// Whether the session holds unsaved changes.
    fn has_pending_changes(&self) -> bool;

    /// Persist pending changes.
    fn save(&mut self) -> Result<(), RepoError>;

    /// Discard pending changes and rebase on the latest saved state.
    fn refresh(&mut self);
}
