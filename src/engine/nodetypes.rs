//! engine::nodetypes
//!
//! Namespace and node type registration.
//!
//! Definitions arrive already parsed (see [`crate::cnd`]). Namespaces
//! declared in a block are registered before its types so the types can
//! use them. The repository decides what counts as a conflict; this module
//! only maps its answers onto [`Change`].

use super::processor::{Change, OperationError};
use crate::cnd::CndDocument;
use crate::repo::{Registration, Session};

fn change_of(registration: Registration) -> Change {
    match registration {
        Registration::Registered => Change::Created,
        Registration::Updated => Change::Updated,
        Registration::Unchanged => Change::Unchanged,
    }
}

/// Register a single prefix mapping.
pub fn register_namespace<S: Session + ?Sized>(
    session: &mut S,
    prefix: &str,
    uri: &str,
) -> Result<Change, OperationError> {
    let registration = session.register_namespace(prefix, uri)?;
    tracing::debug!(prefix, uri, outcome = ?registration, "namespace");
    Ok(change_of(registration))
}

/// Register the namespaces and node types of a parsed block.
pub fn register_node_types<S: Session + ?Sized>(
    session: &mut S,
    document: &CndDocument,
) -> Result<Change, OperationError> {
    let mut outcomes = Vec::with_capacity(document.namespaces.len() + document.node_types.len());
    for ns in &document.namespaces {
        outcomes.push(session.register_namespace(&ns.prefix, &ns.uri)?);
    }

    for (name, registration) in session.register_node_types(&document.node_types)? {
        tracing::debug!(%name, outcome = ?registration, "node type");
        outcomes.push(registration);
    }

    let change = if outcomes.contains(&Registration::Registered) {
        Change::Created
    } else if outcomes.contains(&Registration::Updated) {
        Change::Updated
    } else {
        Change::Unchanged
    };
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnd;
    use crate::core::types::QualifiedName;
    use crate::repo::{MemoryRepository, RepoError};

    fn document(block: &str) -> CndDocument {
        cnd::parse(block).unwrap()
    }

    #[test]
    fn namespace_before_types() {
        let mut s = MemoryRepository::new().login();
        let doc = document("<slingevent='http://sling.apache.org/jcr/event/1.0'>\n[slingevent:Job] > nt:unstructured");
        assert_eq!(register_node_types(&mut s, &doc).unwrap(), Change::Created);
        assert!(s
            .node_type(&QualifiedName::new("slingevent:Job").unwrap())
            .unwrap()
            .is_some());
        assert_eq!(register_node_types(&mut s, &doc).unwrap(), Change::Unchanged);
    }

    #[test]
    fn namespace_remap_conflicts() {
        let mut s = MemoryRepository::new().login();
        register_namespace(&mut s, "foo", "http://example.com/foo").unwrap();
        assert_eq!(
            register_namespace(&mut s, "foo", "http://example.com/foo").unwrap(),
            Change::Unchanged
        );
        let err = register_namespace(&mut s, "foo", "http://example.com/bar").unwrap_err();
        assert!(matches!(
            err,
            OperationError::Repository(RepoError::NamespaceConflict { .. })
        ));
    }

    #[test]
    fn changed_supertypes_conflict() {
        let mut s = MemoryRepository::new().login();
        register_node_types(&mut s, &document("<t='urn:t'>\n[t:a] > nt:folder")).unwrap();
        let err = register_node_types(&mut s, &document("<t='urn:t'>\n[t:a] > nt:unstructured"))
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::Repository(RepoError::NodeTypeConflict { .. })
        ));
    }

    #[test]
    fn undeclared_prefix_fails() {
        let mut s = MemoryRepository::new().login();
        let err = register_node_types(&mut s, &document("[undeclared:a] > nt:base")).unwrap_err();
        assert!(matches!(
            err,
            OperationError::Repository(RepoError::UnknownNamespace { .. })
        ));
    }
}
