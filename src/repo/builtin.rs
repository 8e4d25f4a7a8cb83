//! repo::builtin
//!
//! Namespaces, node types and privileges every repository starts with.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::QualifiedName;
use crate::repo::interface::NodeTypeDefinition;

/// Primary type of the root node.
pub const ROOT_TYPE: &str = "rep:root";

/// Type every primary type without declared supertypes extends.
pub const BASE_TYPE: &str = "nt:base";

/// Primary type of intermediate folders under a principal's home.
pub const AUTHORIZABLE_FOLDER_TYPE: &str = "rep:AuthorizableFolder";

/// Primary type of a regular user's home node.
pub const USER_TYPE: &str = "rep:User";

/// Primary type of a service user's home node.
pub const SYSTEM_USER_TYPE: &str = "rep:SystemUser";

/// Built-in namespace prefixes and URIs.
pub const NAMESPACES: &[(&str, &str)] = &[
    ("jcr", "http://www.jcp.org/jcr/1.0"),
    ("nt", "http://www.jcp.org/jcr/nt/1.0"),
    ("mix", "http://www.jcp.org/jcr/mix/1.0"),
    ("rep", "internal"),
    ("sling", "http://sling.apache.org/jcr/sling/1.0"),
];

/// Built-in primary types as `(name, supertypes, abstract)`.
const PRIMARY_TYPES: &[(&str, &[&str], bool)] = &[
    ("nt:base", &[], true),
    ("nt:hierarchyNode", &["nt:base"], true),
    ("nt:folder", &["nt:hierarchyNode"], false),
    ("nt:file", &["nt:hierarchyNode"], false),
    ("nt:resource", &["nt:base"], false),
    ("nt:unstructured", &["nt:base"], false),
    ("sling:Folder", &["nt:folder"], false),
    ("sling:OrderedFolder", &["sling:Folder"], false),
    ("rep:root", &["nt:unstructured"], false),
    ("rep:Authorizable", &["nt:base"], true),
    ("rep:AuthorizableFolder", &["nt:base"], false),
    ("rep:User", &["rep:Authorizable"], false),
    ("rep:SystemUser", &["rep:User"], false),
];

/// Built-in mixin types as `(name, supertypes)`.
const MIXIN_TYPES: &[(&str, &[&str])] = &[
    ("mix:referenceable", &[]),
    ("mix:versionable", &["mix:referenceable"]),
    ("mix:lockable", &[]),
    ("mix:title", &[]),
    ("mix:created", &[]),
    ("mix:lastModified", &[]),
    ("rep:AccessControllable", &[]),
];

/// Privileges understood by access control entries.
pub const PRIVILEGES: &[&str] = &[
    "jcr:read",
    "jcr:write",
    "jcr:all",
    "jcr:modifyProperties",
    "jcr:addChildNodes",
    "jcr:removeNode",
    "jcr:removeChildNodes",
    "jcr:readAccessControl",
    "jcr:modifyAccessControl",
    "jcr:lockManagement",
    "jcr:versionManagement",
    "jcr:nodeTypeManagement",
    "rep:write",
];

/// Orderable built-in primary types.
const ORDERABLE: &[&str] = &["nt:unstructured", "sling:OrderedFolder", "rep:root"];

fn names(raw: &[&'static str]) -> Vec<QualifiedName> {
    raw.iter().copied().map(QualifiedName::from_static).collect()
}

/// Built-in namespace registry.
pub fn namespaces() -> BTreeMap<String, String> {
    NAMESPACES
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect()
}

/// Built-in node type registry.
pub fn node_types() -> BTreeMap<QualifiedName, NodeTypeDefinition> {
    let mut types = BTreeMap::new();
    for (name, supers, is_abstract) in PRIMARY_TYPES {
        let mut def =
            NodeTypeDefinition::primary(QualifiedName::from_static(name), names(supers));
        def.is_abstract = *is_abstract;
        def.orderable = ORDERABLE.contains(name);
        types.insert(def.name.clone(), def);
    }
    for (name, supers) in MIXIN_TYPES {
        let def = NodeTypeDefinition::mixin(QualifiedName::from_static(name), names(supers));
        types.insert(def.name.clone(), def);
    }
    types
}

/// Built-in privilege set.
pub fn privileges() -> BTreeSet<QualifiedName> {
    PRIVILEGES
        .iter()
        .copied()
        .map(QualifiedName::from_static)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_valid() {
        for (name, _, _) in PRIMARY_TYPES {
            assert!(QualifiedName::new(*name).is_ok(), "{name}");
        }
        for (name, _) in MIXIN_TYPES {
            assert!(QualifiedName::new(*name).is_ok(), "{name}");
        }
        for name in PRIVILEGES {
            assert!(QualifiedName::new(*name).is_ok(), "{name}");
        }
    }

    #[test]
    fn every_prefix_is_registered() {
        let ns = namespaces();
        for name in node_types().keys() {
            assert!(ns.contains_key(name.prefix()), "missing prefix for {name}");
        }
    }

    #[test]
    fn supertypes_are_builtin() {
        let types = node_types();
        for def in types.values() {
            for s in &def.supertypes {
                assert!(types.contains_key(s), "{} references {}", def.name, s);
            }
        }
    }

    #[test]
    fn created_types_are_concrete_primaries() {
        let types = node_types();
        for name in [ROOT_TYPE, AUTHORIZABLE_FOLDER_TYPE, USER_TYPE, SYSTEM_USER_TYPE] {
            let def = &types[&QualifiedName::new(name).unwrap()];
            assert!(!def.mixin, "{name}");
            assert!(!def.is_abstract, "{name}");
        }
    }
}
