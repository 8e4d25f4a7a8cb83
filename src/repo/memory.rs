//! repo::memory
//!
//! In-memory repository driver.
//!
//! # Design
//!
//! [`MemoryRepository`] holds the committed [`RepositoryState`] behind an
//! `Arc<Mutex<...>>` so clones share it. Each [`MemorySession`] works on a
//! private copy of that state plus the revision it was based on:
//!
//! - Mutations only touch the session's working copy
//! - [`Session::save`] publishes the working copy if no other session saved
//!   in between, otherwise it fails with [`RepoError::Conflict`]
//! - [`Session::refresh`] drops pending changes
//!
//! Principals own a home node at their path (`rep:User` or
//! `rep:SystemUser`), with missing ancestors created as
//! `rep:AuthorizableFolder`. Deleting a principal removes that subtree and
//! any access control entries stored on it.
//!
//! This gives a batch the same all-or-nothing shape as a real repository
//! session: nothing is visible to other sessions until the caller saves.
//!
//! # Example
//!
//! ```
//! use repoinit::core::types::{NodePath, QualifiedName};
//! use repoinit::repo::{MemoryRepository, RepoError, Session};
//!
//! let repo = MemoryRepository::new();
//! let mut a = repo.login();
//! let mut b = repo.login();
//! let ty = QualifiedName::new("nt:unstructured").unwrap();
//!
//! a.add_node(&NodePath::new("/a").unwrap(), &ty).unwrap();
//! b.add_node(&NodePath::new("/b").unwrap(), &ty).unwrap();
//!
//! a.save().unwrap();
//! assert!(matches!(b.save(), Err(RepoError::Conflict { .. })));
//! assert_eq!(repo.revision(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::builtin;
use super::interface::{
    AccessControlEntry, Account, NewPrincipal, Node, NodeTypeDefinition, Principal,
    PrincipalDirectory, PrincipalKind, RepoError, Registration, Session,
};
use crate::core::types::{Fingerprint, NodePath, PrincipalId, QualifiedName, UtcTimestamp};

/// Stored form of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub primary_type: QualifiedName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<QualifiedName>,
}

/// Complete repository content.
///
/// This is what the file store persists and what the fingerprint covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    /// Incremented on every successful save.
    pub revision: u64,
    pub namespaces: BTreeMap<String, String>,
    pub node_types: BTreeMap<QualifiedName, NodeTypeDefinition>,
    pub privileges: BTreeSet<QualifiedName>,
    pub nodes: BTreeMap<NodePath, NodeRecord>,
    #[serde(default)]
    pub principals: BTreeMap<PrincipalId, Principal>,
    #[serde(default)]
    pub acl: BTreeMap<NodePath, Vec<AccessControlEntry>>,
}

impl Default for RepositoryState {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl RepositoryState {
    /// A fresh state holding only the built-in schema and the root node.
    pub fn with_builtins() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodePath::root(),
            NodeRecord {
                primary_type: QualifiedName::from_static(builtin::ROOT_TYPE),
                mixins: Vec::new(),
            },
        );
        Self {
            revision: 0,
            namespaces: builtin::namespaces(),
            node_types: builtin::node_types(),
            privileges: builtin::privileges(),
            nodes,
            principals: BTreeMap::new(),
            acl: BTreeMap::new(),
        }
    }

    /// Hash of the content, independent of the revision counter.
    pub fn fingerprint(&self) -> Fingerprint {
        #[derive(Serialize)]
        struct Canonical<'a> {
            namespaces: &'a BTreeMap<String, String>,
            node_types: &'a BTreeMap<QualifiedName, NodeTypeDefinition>,
            privileges: &'a BTreeSet<QualifiedName>,
            nodes: &'a BTreeMap<NodePath, NodeRecord>,
            principals: &'a BTreeMap<PrincipalId, Principal>,
            acl: &'a BTreeMap<NodePath, Vec<AccessControlEntry>>,
        }

        let canonical = Canonical {
            namespaces: &self.namespaces,
            node_types: &self.node_types,
            privileges: &self.privileges,
            nodes: &self.nodes,
            principals: &self.principals,
            acl: &self.acl,
        };
        // All map keys serialize as strings, so encoding cannot fail.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Fingerprint::of_bytes(&bytes)
    }

    fn node_view(&self, path: &NodePath) -> Option<Node> {
        self.nodes.get(path).map(|record| Node {
            path: path.clone(),
            primary_type: record.primary_type.clone(),
            mixins: record.mixins.clone(),
        })
    }

    fn type_def(&self, name: &QualifiedName) -> Result<&NodeTypeDefinition, RepoError> {
        self.node_types
            .get(name)
            .ok_or_else(|| RepoError::NoSuchNodeType {
                name: name.to_string(),
            })
    }

    fn add_node(&mut self, path: &NodePath, primary_type: &QualifiedName) -> Result<Node, RepoError> {
        if self.nodes.contains_key(path) {
            return Err(RepoError::NodeExists {
                path: path.to_string(),
            });
        }
        let parent = path.parent().ok_or_else(|| RepoError::NodeExists {
            path: path.to_string(),
        })?;
        if !self.nodes.contains_key(&parent) {
            return Err(RepoError::ParentMissing {
                path: path.to_string(),
            });
        }

        let def = self.type_def(primary_type)?;
        if def.mixin {
            return Err(RepoError::MixinAsPrimary {
                name: primary_type.to_string(),
            });
        }
        if def.is_abstract {
            return Err(RepoError::AbstractNodeType {
                name: primary_type.to_string(),
            });
        }

        self.nodes.insert(
            path.clone(),
            NodeRecord {
                primary_type: primary_type.clone(),
                mixins: Vec::new(),
            },
        );
        Ok(Node {
            path: path.clone(),
            primary_type: primary_type.clone(),
            mixins: Vec::new(),
        })
    }

    fn add_mixin(&mut self, path: &NodePath, mixin: &QualifiedName) -> Result<bool, RepoError> {
        if !self.type_def(mixin)?.mixin {
            return Err(RepoError::NotAMixin {
                name: mixin.to_string(),
            });
        }
        let record = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| RepoError::NodeNotFound {
                path: path.to_string(),
            })?;
        if record.mixins.contains(mixin) {
            return Ok(false);
        }
        record.mixins.push(mixin.clone());
        Ok(true)
    }

    fn remove_mixin(&mut self, path: &NodePath, mixin: &QualifiedName) -> Result<bool, RepoError> {
        let record = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| RepoError::NodeNotFound {
                path: path.to_string(),
            })?;
        let before = record.mixins.len();
        record.mixins.retain(|m| m != mixin);
        Ok(record.mixins.len() != before)
    }

    fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<Registration, RepoError> {
        if let Some(existing) = self.namespaces.get(prefix) {
            if existing == uri {
                return Ok(Registration::Unchanged);
            }
            return Err(RepoError::NamespaceConflict {
                prefix: prefix.to_string(),
                existing: existing.clone(),
                requested: uri.to_string(),
            });
        }
        if let Some((other, _)) = self.namespaces.iter().find(|(_, u)| u.as_str() == uri) {
            return Err(RepoError::NamespaceConflict {
                prefix: prefix.to_string(),
                existing: format!("{uri} (as '{other}')"),
                requested: uri.to_string(),
            });
        }
        self.namespaces.insert(prefix.to_string(), uri.to_string());
        Ok(Registration::Registered)
    }

    fn register_node_types(
        &mut self,
        definitions: &[NodeTypeDefinition],
    ) -> Result<Vec<(QualifiedName, Registration)>, RepoError> {
        let mut staged = self.node_types.clone();
        let mut results = Vec::with_capacity(definitions.len());

        for def in definitions {
            let def = normalize(def);
            if !self.namespaces.contains_key(def.name.prefix()) {
                return Err(RepoError::UnknownNamespace {
                    prefix: def.name.prefix().to_string(),
                });
            }
            if def.supertypes.contains(&def.name) {
                return Err(RepoError::InvalidNodeType {
                    name: def.name.to_string(),
                    reason: "type lists itself as a supertype".to_string(),
                });
            }

            let outcome = match staged.get(&def.name) {
                None => Registration::Registered,
                Some(existing) => {
                    let same_supers = supertype_set(existing) == supertype_set(&def);
                    if !same_supers || existing.mixin != def.mixin {
                        return Err(RepoError::NodeTypeConflict {
                            name: def.name.to_string(),
                            existing: existing.summary(),
                            requested: def.summary(),
                        });
                    }
                    if *existing == def {
                        Registration::Unchanged
                    } else {
                        Registration::Updated
                    }
                }
            };

            results.push((def.name.clone(), outcome));
            if outcome != Registration::Unchanged {
                staged.insert(def.name.clone(), def);
            }
        }

        // Supertypes resolve against the whole batch so forward references work.
        for (name, _) in &results {
            let Some(def) = staged.get(name) else {
                continue;
            };
            for supertype in &def.supertypes {
                if !staged.contains_key(supertype) {
                    return Err(RepoError::NoSuchNodeType {
                        name: supertype.to_string(),
                    });
                }
            }
        }

        self.node_types = staged;
        Ok(results)
    }

    fn add_access_control_entry(
        &mut self,
        path: &NodePath,
        entry: AccessControlEntry,
    ) -> Result<bool, RepoError> {
        if !self.nodes.contains_key(path) {
            return Err(RepoError::NodeNotFound {
                path: path.to_string(),
            });
        }
        if !self.principals.contains_key(&entry.principal) {
            return Err(RepoError::PrincipalNotFound {
                id: entry.principal.to_string(),
            });
        }
        if let Some(unknown) = entry
            .privileges
            .iter()
            .find(|p| !self.privileges.contains(*p))
        {
            return Err(RepoError::UnknownPrivilege {
                name: unknown.to_string(),
            });
        }

        let entries = self.acl.entry(path.clone()).or_default();
        if entries.contains(&entry) {
            return Ok(false);
        }
        entries.push(entry);
        Ok(true)
    }

    fn create_principal(&mut self, new: NewPrincipal) -> Result<Principal, RepoError> {
        if self.principals.contains_key(&new.id) {
            return Err(RepoError::PrincipalExists {
                id: new.id.to_string(),
            });
        }
        if self.nodes.contains_key(&new.path) {
            return Err(RepoError::NodeExists {
                path: new.path.to_string(),
            });
        }

        let folder = QualifiedName::from_static(builtin::AUTHORIZABLE_FOLDER_TYPE);
        for ancestor in new.path.ancestors() {
            if !self.nodes.contains_key(&ancestor) {
                self.add_node(&ancestor, &folder)?;
            }
        }
        let home_type = match new.kind {
            PrincipalKind::Regular => builtin::USER_TYPE,
            PrincipalKind::Service => builtin::SYSTEM_USER_TYPE,
        };
        self.add_node(&new.path, &QualifiedName::from_static(home_type))?;

        let account = Account {
            id: new.id.clone(),
            path: new.path,
            disabled: false,
            disabled_reason: None,
            password_hash: new.password_hash,
            created_at: UtcTimestamp::now(),
        };
        let principal = match new.kind {
            PrincipalKind::Regular => Principal::Regular(account),
            PrincipalKind::Service => Principal::Service(account),
        };
        self.principals.insert(new.id, principal.clone());
        Ok(principal)
    }

    /// Remove a principal together with its home subtree and the access
    /// control entries stored on it.
    fn delete_principal(&mut self, id: &PrincipalId) -> Result<(), RepoError> {
        let principal = self
            .principals
            .remove(id)
            .ok_or_else(|| RepoError::PrincipalNotFound { id: id.to_string() })?;
        let home = &principal.account().path;
        self.nodes.retain(|path, _| !path.is_within(home));
        self.acl.retain(|path, _| !path.is_within(home));
        Ok(())
    }

    fn principal_mut(&mut self, id: &PrincipalId) -> Result<&mut Principal, RepoError> {
        self.principals
            .get_mut(id)
            .ok_or_else(|| RepoError::PrincipalNotFound { id: id.to_string() })
    }
}

/// Primary types without supertypes implicitly extend `nt:base`.
fn normalize(def: &NodeTypeDefinition) -> NodeTypeDefinition {
    let mut def = def.clone();
    if !def.mixin && def.supertypes.is_empty() && def.name.as_str() != builtin::BASE_TYPE {
        def.supertypes
            .push(QualifiedName::from_static(builtin::BASE_TYPE));
    }
    def
}

fn supertype_set(def: &NodeTypeDefinition) -> BTreeSet<&QualifiedName> {
    def.supertypes.iter().collect()
}

/// Shared in-memory repository.
///
/// Cheap to clone; clones share the committed state.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    inner: Arc<Mutex<RepositoryState>>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// A repository holding only built-in content.
    pub fn new() -> Self {
        Self::from_state(RepositoryState::with_builtins())
    }

    /// A repository seeded from a previously persisted state.
    pub fn from_state(state: RepositoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn committed(&self) -> MutexGuard<'_, RepositoryState> {
        // Saves replace the whole state in one assignment, so a poisoned
        // value is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a session on the latest committed state.
    pub fn login(&self) -> MemorySession {
        let working = self.committed().clone();
        let session = MemorySession {
            id: Uuid::new_v4(),
            repository: self.clone(),
            base_revision: working.revision,
            working,
            dirty: false,
        };
        tracing::debug!(session = %session.id, revision = session.base_revision, "session opened");
        session
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> RepositoryState {
        self.committed().clone()
    }

    /// Revision of the committed state.
    pub fn revision(&self) -> u64 {
        self.committed().revision
    }

    /// Fingerprint of the committed state.
    pub fn fingerprint(&self) -> Fingerprint {
        self.committed().fingerprint()
    }
}

/// A session on a [`MemoryRepository`].
#[derive(Debug)]
pub struct MemorySession {
    id: Uuid,
    repository: MemoryRepository,
    base_revision: u64,
    working: RepositoryState,
    dirty: bool,
}

impl MemorySession {
    /// Session identifier, used in log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Revision this session's working copy is based on.
    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }

    /// The session's working copy, including pending changes.
    pub fn working_state(&self) -> &RepositoryState {
        &self.working
    }

    fn mark(&mut self, changed: bool) {
        self.dirty |= changed;
    }
}

impl PrincipalDirectory for MemorySession {
    fn lookup(&self, id: &PrincipalId) -> Result<Option<Principal>, RepoError> {
        Ok(self.working.principals.get(id).cloned())
    }

    fn create(&mut self, principal: NewPrincipal) -> Result<Principal, RepoError> {
        let created = self.working.create_principal(principal)?;
        self.mark(true);
        Ok(created)
    }

    fn delete(&mut self, id: &PrincipalId) -> Result<(), RepoError> {
        self.working.delete_principal(id)?;
        self.mark(true);
        Ok(())
    }

    fn set_enabled(
        &mut self,
        id: &PrincipalId,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), RepoError> {
        let account = self.working.principal_mut(id)?.account_mut();
        account.disabled = !enabled;
        account.disabled_reason = if enabled {
            None
        } else {
            reason.map(str::to_string)
        };
        self.mark(true);
        Ok(())
    }
}

impl Session for MemorySession {
    fn node(&self, path: &NodePath) -> Result<Option<Node>, RepoError> {
        Ok(self.working.node_view(path))
    }

    fn add_node(&mut self, path: &NodePath, primary_type: &QualifiedName) -> Result<Node, RepoError> {
        let node = self.working.add_node(path, primary_type)?;
        self.mark(true);
        Ok(node)
    }

    fn add_mixin(&mut self, path: &NodePath, mixin: &QualifiedName) -> Result<bool, RepoError> {
        let added = self.working.add_mixin(path, mixin)?;
        self.mark(added);
        Ok(added)
    }

    fn remove_mixin(&mut self, path: &NodePath, mixin: &QualifiedName) -> Result<bool, RepoError> {
        let removed = self.working.remove_mixin(path, mixin)?;
        self.mark(removed);
        Ok(removed)
    }

    fn namespace_uri(&self, prefix: &str) -> Result<Option<String>, RepoError> {
        Ok(self.working.namespaces.get(prefix).cloned())
    }

    fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<Registration, RepoError> {
        let outcome = self.working.register_namespace(prefix, uri)?;
        self.mark(outcome != Registration::Unchanged);
        Ok(outcome)
    }

    fn node_type(&self, name: &QualifiedName) -> Result<Option<NodeTypeDefinition>, RepoError> {
        Ok(self.working.node_types.get(name).cloned())
    }

    fn register_node_types(
        &mut self,
        definitions: &[NodeTypeDefinition],
    ) -> Result<Vec<(QualifiedName, Registration)>, RepoError> {
        let results = self.working.register_node_types(definitions)?;
        let changed = results
            .iter()
            .any(|(_, outcome)| *outcome != Registration::Unchanged);
        self.mark(changed);
        Ok(results)
    }

    fn add_access_control_entry(
        &mut self,
        path: &NodePath,
        entry: AccessControlEntry,
    ) -> Result<bool, RepoError> {
        let added = self.working.add_access_control_entry(path, entry)?;
        self.mark(added);
        Ok(added)
    }

    fn access_control_entries(
        &self,
        path: &NodePath,
    ) -> Result<Vec<AccessControlEntry>, RepoError> {
        Ok(self.working.acl.get(path).cloned().unwrap_or_default())
    }

    fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<(), RepoError> {
        if !self.dirty {
            return Ok(());
        }

        let mut committed = self.repository.committed();
        if committed.revision != self.base_revision {
            tracing::warn!(
                session = %self.id,
                base = self.base_revision,
                current = committed.revision,
                "save rejected, session is stale"
            );
            return Err(RepoError::Conflict {
                base: self.base_revision,
                current: committed.revision,
            });
        }

        self.working.revision = self.base_revision + 1;
        *committed = self.working.clone();
        drop(committed);

        self.base_revision = self.working.revision;
        self.dirty = false;
        tracing::debug!(session = %self.id, revision = self.base_revision, "session saved");
        Ok(())
    }

    fn refresh(&mut self) {
        self.working = self.repository.committed().clone();
        self.base_revision = self.working.revision;
        self.dirty = false;
    }
}
