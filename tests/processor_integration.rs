//! Integration tests for the operation processor.
//!
//! These tests run scripts end to end: parse, apply against a
//! MemoryRepository session, save, then check the committed state.

use repoinit::core::types::{NodePath, PrincipalId, QualifiedName};
use repoinit::engine::verify::{self, Presence, VerifyError};
use repoinit::engine::{ApplyError, Change, OperationError, OpsProcessor, ProcessorOptions};
use repoinit::engine::{ApplyReport, Operation};
use repoinit::repo::{MemoryRepository, PrincipalKind, RepoError, Session};
use repoinit::script;

// =============================================================================
// Test Helpers
// =============================================================================

/// A repository plus helpers to run scripts and assert on the result.
struct TestUtil {
    repo: MemoryRepository,
    processor: OpsProcessor,
}

impl TestUtil {
    fn new() -> Self {
        Self {
            repo: MemoryRepository::new(),
            processor: OpsProcessor::new(ProcessorOptions::default()),
        }
    }

    /// Parse, apply and save a script in a fresh session.
    fn parse_and_execute(&self, text: &str) -> Result<ApplyReport, ApplyError> {
        let ops = script::parse(text).expect("script parses");
        let mut session = self.repo.login();
        let report = self.processor.apply(&mut session, &ops)?;
        session.save().expect("save succeeds");
        Ok(report)
    }

    fn id(id: &str) -> PrincipalId {
        PrincipalId::new(id).expect("valid id")
    }

    fn assert_user(&self, id: &str, present: bool, path_contains: Option<&str>) {
        self.assert_principal(id, PrincipalKind::Regular, present, path_contains);
    }

    fn assert_service_user(&self, id: &str, present: bool, path_contains: Option<&str>) {
        self.assert_principal(id, PrincipalKind::Service, present, path_contains);
    }

    fn assert_principal(
        &self,
        id: &str,
        kind: PrincipalKind,
        present: bool,
        path_contains: Option<&str>,
    ) {
        let expected = if present {
            Presence::Present {
                kind,
                path_contains,
            }
        } else {
            Presence::Absent
        };
        let session = self.repo.login();
        if let Err(err) = verify::check_principal(&session, &Self::id(id), expected) {
            panic!("{kind} {id}: {err}");
        }
    }

    fn assert_disabled_user(&self, id: &str, disabled: bool) {
        let session = self.repo.login();
        if let Err(err) = verify::check_disabled(&session, &Self::id(id), disabled) {
            panic!("{err}");
        }
    }

    fn check_node(
        &self,
        path: &str,
        primary_type: Option<&str>,
        mixins: Option<&[&str]>,
    ) -> Result<(), VerifyError> {
        let session = self.repo.login();
        let primary_type = primary_type.map(|t| QualifiedName::new(t).expect("valid type"));
        let mixins: Option<Vec<QualifiedName>> = mixins.map(|m| {
            m.iter()
                .map(|n| QualifiedName::new(*n).expect("valid mixin"))
                .collect()
        });
        verify::check_node(
            &session,
            &NodePath::new(path).expect("valid path"),
            primary_type.as_ref(),
            mixins.as_deref(),
        )
    }

    fn assert_node_exists(&self, path: &str, primary_type: Option<&str>, mixins: Option<&[&str]>) {
        if let Err(err) = self.check_node(path, primary_type, mixins) {
            panic!("{err}");
        }
    }
}

// =============================================================================
// Principals
// =============================================================================

mod principals {
    use super::*;

    #[test]
    fn create_service_user_twice() {
        let t = TestUtil::new();
        t.parse_and_execute("create service user svc").unwrap();
        let report = t.parse_and_execute("create service user svc").unwrap();
        assert!(report.is_noop());
        t.assert_service_user("svc", true, Some("/home/users/system/"));
    }

    #[test]
    fn create_twice_in_one_batch() {
        let t = TestUtil::new();
        let report = t
            .parse_and_execute("create service user svc\ncreate service user svc")
            .unwrap();
        assert_eq!(report.outcomes[0].change, Change::Created);
        assert_eq!(report.outcomes[1].change, Change::Unchanged);
        assert_eq!(t.repo.snapshot().principals.len(), 1);
    }

    #[test]
    fn delete_absent_service_user() {
        let t = TestUtil::new();
        let before = t.repo.fingerprint();
        let report = t.parse_and_execute("delete service user ghost").unwrap();
        assert_eq!(report.outcomes[0].change, Change::Unchanged);
        assert_eq!(t.repo.fingerprint(), before);
    }

    #[test]
    fn create_then_delete() {
        let t = TestUtil::new();
        t.parse_and_execute("create service user a, b").unwrap();
        t.parse_and_execute("delete service user a").unwrap();
        t.assert_service_user("a", false, None);
        t.assert_service_user("b", true, None);
    }

    #[test]
    fn disable_enable_round_trip() {
        let t = TestUtil::new();
        t.parse_and_execute("create user alice with password secret").unwrap();
        t.assert_user("alice", true, Some("/home/users/a/"));
        t.assert_disabled_user("alice", false);

        t.parse_and_execute("disable user alice : \"left the team\"").unwrap();
        t.assert_disabled_user("alice", true);
        let stored = t.repo.snapshot().principals[&TestUtil::id("alice")].clone();
        assert_eq!(
            stored.account().disabled_reason.as_deref(),
            Some("left the team")
        );
        assert_ne!(stored.account().password_hash.as_deref(), Some("secret"));

        t.parse_and_execute("enable user alice").unwrap();
        t.assert_disabled_user("alice", false);
    }

    #[test]
    fn service_user_path() {
        let t = TestUtil::new();
        t.parse_and_execute("create service user svc with path system/app")
            .unwrap();
        t.assert_service_user("svc", true, Some("system/app"));
        t.assert_user("svc", true, None);
    }

    #[test]
    fn id_that_cannot_be_a_path_segment_fails_validation() {
        let ops = script::parse("create path /x\ncreate service user app*reader").unwrap();
        let repo = MemoryRepository::new();
        let mut session = repo.login();
        let err = OpsProcessor::default()
            .apply(&mut session, &ops)
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, OperationError::Type(_)));
        assert!(!session.has_pending_changes());
    }

    #[test]
    fn leading_dot_user_gets_underscore_folder() {
        let t = TestUtil::new();
        t.parse_and_execute("create user .bob").unwrap();
        t.assert_user(".bob", true, Some("/home/users/_/.bob"));
        t.assert_node_exists("/home/users/_/.bob", Some("rep:User"), None);
    }

    #[test]
    fn kinds_do_not_mix() {
        let t = TestUtil::new();
        t.parse_and_execute("create user bob").unwrap();
        let err = t.parse_and_execute("create service user bob").unwrap_err();
        assert!(matches!(err.source, OperationError::KindMismatch { .. }));
    }
}

// =============================================================================
// Nodes
// =============================================================================

mod nodes {
    use super::*;

    #[test]
    fn mixin_exactness() {
        let t = TestUtil::new();
        t.parse_and_execute("create path /a/b(mixin mix:title, mix:created)")
            .unwrap();

        t.assert_node_exists("/a/b", None, Some(&["mix:title", "mix:created"]));
        assert!(matches!(
            t.check_node("/a/b", None, Some(&["mix:title"])),
            Err(VerifyError::MixinMismatch { .. })
        ));
        assert!(matches!(
            t.check_node("/a/b", None, Some(&["mix:title", "mix:created", "mix:lockable"])),
            Err(VerifyError::MixinMismatch { .. })
        ));
    }

    #[test]
    fn repeated_mixin_is_idempotent_on_rerun() {
        let t = TestUtil::new();
        let text = "create path /a(mixin mix:title, mix:title)";
        t.parse_and_execute(text).unwrap();
        let report = t.parse_and_execute(text).unwrap();
        assert!(report.is_noop());
        t.assert_node_exists("/a", None, Some(&["mix:title"]));
    }

    #[test]
    fn primary_type_mismatch_names_both_types() {
        let t = TestUtil::new();
        t.parse_and_execute("create path /a(nt:unstructured)").unwrap();
        let err = t.check_node("/a", Some("nt:folder"), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Primary type mismatch for /a, expected nt:folder but got nt:unstructured"
        );
    }

    #[test]
    fn default_type_applies_to_segments() {
        let t = TestUtil::new();
        t.parse_and_execute("create path (sling:Folder) /content/site(nt:folder)/en")
            .unwrap();
        t.assert_node_exists("/content", Some("sling:Folder"), None);
        t.assert_node_exists("/content/site", Some("nt:folder"), None);
        t.assert_node_exists("/content/site/en", Some("sling:Folder"), None);
    }

    #[test]
    fn create_over_conflicting_node_fails() {
        let t = TestUtil::new();
        t.parse_and_execute("create path /a(nt:folder)").unwrap();
        let err = t.parse_and_execute("create path /a(sling:Folder)").unwrap_err();
        assert!(matches!(
            err.source,
            OperationError::Verify(VerifyError::PrimaryTypeMismatch { .. })
        ));
    }

    #[test]
    fn add_and_remove_mixins() {
        let t = TestUtil::new();
        t.parse_and_execute("create path /p1\ncreate path /p2\nadd mixin mix:lockable to /p1, /p2")
            .unwrap();
        t.assert_node_exists("/p2", None, Some(&["mix:lockable"]));
        t.parse_and_execute("remove mixin mix:lockable from /p2").unwrap();
        t.assert_node_exists("/p2", None, Some(&[]));
    }
}

// =============================================================================
// Schema
// =============================================================================

mod schema {
    use super::*;

    const TYPES: &str = "register nodetypes
<<===
<slingevent='http://sling.apache.org/jcr/event/1.0'>
[slingevent:Event] > nt:unstructured
  - event.topics (String)
[slingevent:Job] > slingevent:Event, mix:lockable
  orderable
===>>
";

    #[test]
    fn registration_is_idempotent() {
        let t = TestUtil::new();
        let first = t.parse_and_execute(TYPES).unwrap();
        assert_eq!(first.outcomes[0].change, Change::Created);
        let second = t.parse_and_execute(TYPES).unwrap();
        assert_eq!(second.outcomes[0].change, Change::Unchanged);

        t.parse_and_execute("create path /var/job(slingevent:Job)")
            .unwrap();
        t.assert_node_exists("/var/job", Some("slingevent:Job"), None);
    }

    #[test]
    fn changed_supertype_is_rejected() {
        let t = TestUtil::new();
        t.parse_and_execute(TYPES).unwrap();
        let changed = TYPES.replace(
            "[slingevent:Event] > nt:unstructured",
            "[slingevent:Event] > nt:folder",
        );
        let err = t.parse_and_execute(&changed).unwrap_err();
        assert!(matches!(
            err.source,
            OperationError::Repository(RepoError::NodeTypeConflict { .. })
        ));
    }

    #[test]
    fn namespace_statement() {
        let t = TestUtil::new();
        t.parse_and_execute("register namespace (foo) http://example.com/foo")
            .unwrap();
        let err = t
            .parse_and_execute("register namespace (foo) http://example.com/other")
            .unwrap_err();
        assert!(matches!(
            err.source,
            OperationError::Repository(RepoError::NamespaceConflict { .. })
        ));
    }
}

// =============================================================================
// Ordering and batch boundaries
// =============================================================================

mod ordering {
    use super::*;

    #[test]
    fn acl_after_user_succeeds() {
        let t = TestUtil::new();
        t.parse_and_execute(
            "create path /x\ncreate service user reader\nset ACL for reader\n  allow jcr:read on /x\nend",
        )
        .unwrap();
        let entries = t
            .repo
            .login()
            .access_control_entries(&NodePath::new("/x").unwrap())
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn acl_on_user_home() {
        let t = TestUtil::new();
        t.parse_and_execute(
            "create service user svc\nset ACL for svc\n  allow jcr:all on /home/users/system/svc\nend",
        )
        .unwrap();
        t.assert_node_exists("/home/users/system/svc", Some("rep:SystemUser"), None);
        t.assert_node_exists("/home/users/system", Some("rep:AuthorizableFolder"), None);

        t.parse_and_execute("delete service user svc").unwrap();
        let session = t.repo.login();
        let home = NodePath::new("/home/users/system/svc").unwrap();
        assert!(!session.node_exists(&home).unwrap());
        assert!(session.access_control_entries(&home).unwrap().is_empty());
    }

    #[test]
    fn acl_before_user_fails_at_grant() {
        let t = TestUtil::new();
        let err = t
            .parse_and_execute(
                "create path /x\nset ACL for reader\n  allow jcr:read on /x\nend\ncreate service user reader",
            )
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, OperationError::PrincipalNotFound { .. }));
    }

    #[test]
    fn failure_stops_batch_without_commit() {
        let repo = MemoryRepository::new();
        let ops = vec![
            Operation::CreateServiceUser {
                id: "one".into(),
                path: None,
            },
            Operation::CreateServiceUser {
                id: "two".into(),
                path: None,
            },
            Operation::EnableUser { id: "ghost".into() },
            Operation::CreateServiceUser {
                id: "four".into(),
                path: None,
            },
            Operation::CreateNode {
                path: "/five".into(),
                primary_type: None,
                mixins: None,
            },
        ];

        let mut session = repo.login();
        let err = OpsProcessor::default()
            .apply(&mut session, &ops)
            .unwrap_err();
        assert_eq!(err.index, 2);

        let four = PrincipalId::new("four").unwrap();
        assert!(repoinit::repo::PrincipalDirectory::lookup(&session, &four)
            .unwrap()
            .is_none());
        assert!(!session.node_exists(&NodePath::new("/five").unwrap()).unwrap());

        // Nothing committed until the caller saves.
        assert_eq!(repo.revision(), 0);
        assert!(repo.snapshot().principals.is_empty());
    }

    #[test]
    fn concurrent_sessions_conflict() {
        let t = TestUtil::new();
        let mut first = t.repo.login();
        let mut second = t.repo.login();
        let processor = OpsProcessor::default();

        processor
            .apply(&mut first, &script::parse("create path /a").unwrap())
            .unwrap();
        processor
            .apply(&mut second, &script::parse("create path /b").unwrap())
            .unwrap();
        first.save().unwrap();
        assert!(matches!(second.save(), Err(RepoError::Conflict { .. })));

        second.refresh();
        processor
            .apply(&mut second, &script::parse("create path /b").unwrap())
            .unwrap();
        second.save().unwrap();
        t.assert_node_exists("/a", None, None);
        t.assert_node_exists("/b", None, None);
    }
}
