//! Property-based tests for core domain types and the processor.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use repoinit::cnd;
use repoinit::core::types::{NodePath, PrincipalId, QualifiedName};
use repoinit::engine::{Change, Operation, OpsProcessor, ProcessorOptions};
use repoinit::repo::{MemoryRepository, NodeTypeDefinition, Session};
use repoinit::script;

/// Strategy for valid path segments.
fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

/// Strategy for valid absolute paths below the root.
fn node_path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..6).prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Strategy for valid principal ids.
fn principal_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._-]{0,15}".prop_filter("keyword", |id| id != "with")
}

/// Strategy for qualified names.
fn qualified_name() -> impl Strategy<Value = QualifiedName> {
    ("[a-z]{1,5}", "[a-zA-Z][a-zA-Z0-9_]{0,10}")
        .prop_map(|(prefix, local)| QualifiedName::new(format!("{prefix}:{local}")).unwrap())
}

/// Strategy for bare node type definitions.
fn type_definition() -> impl Strategy<Value = NodeTypeDefinition> {
    (
        qualified_name(),
        prop::collection::vec(qualified_name(), 0..4),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(name, supertypes, mixin, is_abstract)| {
            let mut def = if mixin {
                NodeTypeDefinition::mixin(name, supertypes)
            } else {
                NodeTypeDefinition::primary(name, supertypes)
            };
            def.is_abstract = is_abstract;
            def
        })
}

proptest! {
    #[test]
    fn generated_paths_are_valid(path in node_path()) {
        let parsed = NodePath::new(path.as_str()).unwrap();
        prop_assert_eq!(parsed.as_str(), path.as_str());
        prop_assert_eq!(parsed.depth(), path.matches('/').count());
    }

    #[test]
    fn child_then_parent_is_identity(path in node_path(), name in segment()) {
        let parent = NodePath::new(path).unwrap();
        let child = parent.child(&name).unwrap();
        prop_assert_eq!(child.name(), name.as_str());
        prop_assert_eq!(child.parent(), Some(parent.clone()));
        prop_assert!(child.is_within(&parent));
        prop_assert!(!parent.is_within(&child));
    }

    #[test]
    fn ancestors_lead_down_to_parent(path in node_path()) {
        let path = NodePath::new(path).unwrap();
        let ancestors = path.ancestors();
        prop_assert_eq!(ancestors.len(), path.depth() - 1);
        for (i, ancestor) in ancestors.iter().enumerate() {
            prop_assert_eq!(ancestor.depth(), i + 1);
            prop_assert!(path.is_within(ancestor));
        }
        if let Some(last) = ancestors.last() {
            prop_assert_eq!(Some(last.clone()), path.parent());
        }
    }

    #[test]
    fn trailing_slash_rejected(path in node_path()) {
        let trailing = format!("{}/", path);
        prop_assert!(NodePath::new(trailing).is_err());
        prop_assert!(NodePath::new(path.trim_start_matches('/')).is_err());
    }

    #[test]
    fn qualified_name_splits(prefix in "[a-z]{1,6}", local in "[a-zA-Z][a-zA-Z0-9_.-]{0,10}") {
        let name = QualifiedName::new(format!("{prefix}:{local}")).unwrap();
        prop_assert_eq!(name.prefix(), prefix.as_str());
        prop_assert_eq!(name.local_name(), local.as_str());
    }

    #[test]
    fn principal_ids_reject_separators(id in principal_id(), sep in prop::sample::select(vec!['/', ',', ' ', '*', '|', '['])) {
        prop_assert!(PrincipalId::new(id.as_str()).is_ok());
        let with_sep = format!("{}{}x", id, sep);
        prop_assert!(PrincipalId::new(with_sep).is_err());
    }

    #[test]
    fn user_lists_keep_order(ids in prop::collection::vec(principal_id(), 1..6)) {
        let text = format!("create service user {}", ids.join(", "));
        let ops = script::parse(&text).unwrap();
        let parsed: Vec<String> = ops
            .iter()
            .map(|op| match op {
                Operation::CreateServiceUser { id, .. } => id.clone(),
                other => panic!("unexpected operation {other:?}"),
            })
            .collect();
        prop_assert_eq!(parsed, ids);
    }

    #[test]
    fn create_path_emits_one_operation_per_segment(path in node_path()) {
        let ops = script::parse(&format!("create path {path}")).unwrap();
        prop_assert_eq!(ops.len(), path.matches('/').count());
    }

    #[test]
    fn type_summaries_parse_back(defs in prop::collection::vec(type_definition(), 1..5)) {
        let text: Vec<String> = defs.iter().map(NodeTypeDefinition::summary).collect();
        let doc = cnd::parse(&text.join("\n")).unwrap();
        prop_assert!(doc.namespaces.is_empty());
        prop_assert_eq!(doc.node_types, defs);
    }

    #[test]
    fn applying_twice_changes_nothing(paths in prop::collection::vec(node_path(), 1..5)) {
        let text: String = paths.iter().map(|p| format!("create path {p}\n")).collect();
        let ops = script::parse(&text).unwrap();
        let repo = MemoryRepository::new();
        let processor = OpsProcessor::new(ProcessorOptions::default());

        let mut session = repo.login();
        processor.apply(&mut session, &ops).unwrap();
        session.save().unwrap();

        let mut session = repo.login();
        let report = processor.apply(&mut session, &ops).unwrap();
        prop_assert!(report.outcomes.iter().all(|o| o.change == Change::Unchanged));
        prop_assert!(!session.has_pending_changes());
    }
}
