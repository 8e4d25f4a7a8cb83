//! engine::principals
//!
//! Idempotent reconciliation of users and service users.
//!
//! # Placement
//!
//! Principals live under two roots described by a [`DirectoryLayout`]:
//!
//! | Kind | Default location | `with path P` |
//! |------|------------------|---------------|
//! | user | `<users>/<first char>/<id>` | `<P>/<id>` |
//! | service user | `<system>/<id>` | `<P>/<id>` |
//!
//! A relative `P` resolves under the users root. A service user must end up
//! under the system root; a regular user under the users root but outside
//! the system root.
//!
//! # Idempotence
//!
//! - Creating an existing principal of the same kind succeeds unchanged
//! - Creating over a principal of the other kind fails
//! - Deleting an absent principal succeeds unchanged
//! - Enabling or disabling requires the principal to exist

use super::plan::UserPath;
use super::processor::{Change, OperationError};
use crate::core::types::{NodePath, PrincipalId};
use crate::repo::{NewPrincipal, PrincipalDirectory, PrincipalKind};

/// Roots of the user tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub users_path: NodePath,
    pub system_users_path: NodePath,
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self {
            users_path: NodePath::from_static(Self::DEFAULT_USERS_PATH),
            system_users_path: NodePath::from_static(Self::DEFAULT_SYSTEM_USERS_PATH),
        }
    }
}

impl DirectoryLayout {
    pub const DEFAULT_USERS_PATH: &'static str = "/home/users";
    pub const DEFAULT_SYSTEM_USERS_PATH: &'static str = "/home/users/system";

    /// Full path for a principal.
    pub fn resolve(
        &self,
        id: &PrincipalId,
        kind: PrincipalKind,
        requested: Option<&UserPath>,
    ) -> Result<NodePath, OperationError> {
        let parent = match (requested, kind) {
            (Some(UserPath::Absolute(path)), _) => path.clone(),
            (Some(UserPath::Relative(rel)), _) => self.users_path.join(rel)?,
            (None, PrincipalKind::Regular) => self.users_path.child(id.shard())?,
            (None, PrincipalKind::Service) => self.system_users_path.clone(),
        };
        let path = parent.child(id.as_str())?;
        self.check_containment(id, kind, &path)?;
        Ok(path)
    }

    /// Check that `path` lies under the root for `kind`.
    pub fn check_containment(
        &self,
        id: &PrincipalId,
        kind: PrincipalKind,
        path: &NodePath,
    ) -> Result<(), OperationError> {
        let outside = |reason: String| OperationError::PathOutsideRoot {
            id: id.clone(),
            kind,
            path: path.clone(),
            reason,
        };

        match kind {
            PrincipalKind::Service => {
                if !path.is_within(&self.system_users_path) || path == &self.system_users_path {
                    return Err(outside(format!(
                        "service users must be below {}",
                        self.system_users_path
                    )));
                }
            }
            PrincipalKind::Regular => {
                if !path.is_within(&self.users_path) || path == &self.users_path {
                    return Err(outside(format!(
                        "users must be below {}",
                        self.users_path
                    )));
                }
                if path.is_within(&self.system_users_path) {
                    return Err(outside(format!(
                        "{} is reserved for service users",
                        self.system_users_path
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Create a principal unless one with the same id already exists.
pub fn create<D: PrincipalDirectory + ?Sized>(
    directory: &mut D,
    layout: &DirectoryLayout,
    id: &PrincipalId,
    kind: PrincipalKind,
    password_hash: Option<&str>,
    requested: Option<&UserPath>,
) -> Result<Change, OperationError> {
    let path = layout.resolve(id, kind, requested)?;

    if let Some(existing) = directory.lookup(id)? {
        if existing.kind() != kind {
            return Err(OperationError::KindMismatch {
                id: id.clone(),
                requested: kind,
                actual: existing.kind(),
            });
        }
        if requested.is_some() && existing.path() != &path {
            tracing::warn!(
                %id,
                existing = %existing.path(),
                requested = %path,
                "{kind} already exists at a different path, leaving it in place"
            );
        }
        return Ok(Change::Unchanged);
    }

    directory.create(NewPrincipal {
        id: id.clone(),
        kind,
        path: path.clone(),
        password_hash: password_hash.map(str::to_string),
    })?;
    tracing::debug!(%id, %path, "created {kind}");
    Ok(Change::Created)
}

/// Remove a principal if present.
///
/// The id is removed whatever its kind, so `delete service user` also
/// clears a regular user with that id.
pub fn delete<D: PrincipalDirectory + ?Sized>(
    directory: &mut D,
    id: &PrincipalId,
    kind: PrincipalKind,
) -> Result<Change, OperationError> {
    let Some(existing) = directory.lookup(id)? else {
        return Ok(Change::Unchanged);
    };
    if existing.kind() != kind {
        tracing::debug!(%id, actual = %existing.kind(), "deleting principal of the other kind");
    }
    directory.delete(id)?;
    Ok(Change::Removed)
}

/// Enable or disable an existing principal.
pub fn set_enabled<D: PrincipalDirectory + ?Sized>(
    directory: &mut D,
    id: &PrincipalId,
    enabled: bool,
    reason: Option<&str>,
) -> Result<Change, OperationError> {
    let existing = directory
        .lookup(id)?
        .ok_or_else(|| OperationError::PrincipalNotFound { id: id.clone() })?;

    let account = existing.account();
    let unchanged = if enabled {
        !account.disabled
    } else {
        account.disabled && account.disabled_reason.as_deref() == reason
    };
    if unchanged {
        return Ok(Change::Unchanged);
    }

    directory.set_enabled(id, enabled, reason)?;
    Ok(Change::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{MemoryRepository, MemorySession};

    fn id(s: &str) -> PrincipalId {
        PrincipalId::new(s).unwrap()
    }

    fn path(s: &str) -> NodePath {
        NodePath::new(s).unwrap()
    }

    fn session() -> MemorySession {
        MemoryRepository::new().login()
    }

    mod layout {
        use super::*;

        #[test]
        fn defaults_are_valid_paths() {
            assert!(NodePath::new(DirectoryLayout::DEFAULT_USERS_PATH).is_ok());
            assert!(NodePath::new(DirectoryLayout::DEFAULT_SYSTEM_USERS_PATH).is_ok());
        }

        #[test]
        fn default_locations() {
            let layout = DirectoryLayout::default();
            assert_eq!(
                layout
                    .resolve(&id("alice"), PrincipalKind::Regular, None)
                    .unwrap(),
                path("/home/users/a/alice")
            );
            assert_eq!(
                layout
                    .resolve(&id("svc"), PrincipalKind::Service, None)
                    .unwrap(),
                path("/home/users/system/svc")
            );
        }

        #[test]
        fn relative_and_absolute() {
            let layout = DirectoryLayout::default();
            let rel = UserPath::Relative("system/app".to_string());
            assert_eq!(
                layout
                    .resolve(&id("svc"), PrincipalKind::Service, Some(&rel))
                    .unwrap(),
                path("/home/users/system/app/svc")
            );
            let abs = UserPath::Absolute(path("/home/users/team"));
            assert_eq!(
                layout
                    .resolve(&id("bob"), PrincipalKind::Regular, Some(&abs))
                    .unwrap(),
                path("/home/users/team/bob")
            );
        }

        #[test]
        fn kinds_stay_in_their_roots() {
            let layout = DirectoryLayout::default();
            let in_system = UserPath::Relative("system/x".to_string());
            assert!(matches!(
                layout.resolve(&id("bob"), PrincipalKind::Regular, Some(&in_system)),
                Err(OperationError::PathOutsideRoot { .. })
            ));

            let plain = UserPath::Relative("team".to_string());
            assert!(matches!(
                layout.resolve(&id("svc"), PrincipalKind::Service, Some(&plain)),
                Err(OperationError::PathOutsideRoot { .. })
            ));

            let elsewhere = UserPath::Absolute(path("/content"));
            assert!(layout
                .resolve(&id("bob"), PrincipalKind::Regular, Some(&elsewhere))
                .is_err());
        }
    }

    mod create {
        use super::*;

        #[test]
        fn twice_is_idempotent() {
            let mut s = session();
            let layout = DirectoryLayout::default();
            let first = create(&mut s, &layout, &id("svc"), PrincipalKind::Service, None, None);
            let second = create(&mut s, &layout, &id("svc"), PrincipalKind::Service, None, None);
            assert_eq!(first.unwrap(), Change::Created);
            assert_eq!(second.unwrap(), Change::Unchanged);
        }

        #[test]
        fn other_kind_fails() {
            let mut s = session();
            let layout = DirectoryLayout::default();
            create(&mut s, &layout, &id("x"), PrincipalKind::Regular, None, None).unwrap();
            let err =
                create(&mut s, &layout, &id("x"), PrincipalKind::Service, None, None).unwrap_err();
            assert!(matches!(
                err,
                OperationError::KindMismatch {
                    requested: PrincipalKind::Service,
                    actual: PrincipalKind::Regular,
                    ..
                }
            ));
        }

        #[test]
        fn different_path_left_in_place() {
            let mut s = session();
            let layout = DirectoryLayout::default();
            create(&mut s, &layout, &id("svc"), PrincipalKind::Service, None, None).unwrap();
            let moved = UserPath::Relative("system/other".to_string());
            let change = create(
                &mut s,
                &layout,
                &id("svc"),
                PrincipalKind::Service,
                None,
                Some(&moved),
            )
            .unwrap();
            assert_eq!(change, Change::Unchanged);
            let p = s.lookup(&id("svc")).unwrap().unwrap();
            assert_eq!(p.path(), &path("/home/users/system/svc"));
        }

        #[test]
        fn stores_password_hash() {
            let mut s = session();
            create(
                &mut s,
                &DirectoryLayout::default(),
                &id("alice"),
                PrincipalKind::Regular,
                Some("abc123"),
                None,
            )
            .unwrap();
            let p = s.lookup(&id("alice")).unwrap().unwrap();
            assert_eq!(p.account().password_hash.as_deref(), Some("abc123"));
        }
    }

    mod delete {
        use super::*;

        #[test]
        fn absent_is_unchanged() {
            let mut s = session();
            assert_eq!(
                delete(&mut s, &id("nobody"), PrincipalKind::Service).unwrap(),
                Change::Unchanged
            );
            assert!(!crate::repo::Session::has_pending_changes(&s));
        }

        #[test]
        fn removes_either_kind() {
            let mut s = session();
            let layout = DirectoryLayout::default();
            create(&mut s, &layout, &id("u"), PrincipalKind::Regular, None, None).unwrap();
            assert_eq!(
                delete(&mut s, &id("u"), PrincipalKind::Service).unwrap(),
                Change::Removed
            );
            assert!(s.lookup(&id("u")).unwrap().is_none());
        }
    }

    mod enable_disable {
        use super::*;

        #[test]
        fn missing_principal_fails() {
            let mut s = session();
            assert!(matches!(
                set_enabled(&mut s, &id("ghost"), false, None),
                Err(OperationError::PrincipalNotFound { .. })
            ));
        }

        #[test]
        fn round_trip() {
            let mut s = session();
            create(
                &mut s,
                &DirectoryLayout::default(),
                &id("u"),
                PrincipalKind::Regular,
                None,
                None,
            )
            .unwrap();

            assert_eq!(
                set_enabled(&mut s, &id("u"), true, None).unwrap(),
                Change::Unchanged
            );
            assert_eq!(
                set_enabled(&mut s, &id("u"), false, Some("left")).unwrap(),
                Change::Updated
            );
            assert!(s.lookup(&id("u")).unwrap().unwrap().is_disabled());
            assert_eq!(
                set_enabled(&mut s, &id("u"), false, Some("left")).unwrap(),
                Change::Unchanged
            );
            assert_eq!(
                set_enabled(&mut s, &id("u"), true, None).unwrap(),
                Change::Updated
            );
            assert!(!s.lookup(&id("u")).unwrap().unwrap().is_disabled());
        }
    }
}
