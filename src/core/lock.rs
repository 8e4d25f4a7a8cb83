//! core::lock
//!
//! Exclusive lock on a repository store file.
//!
//! # Architecture
//!
//! In-process sessions are serialized by the memory driver's revision check.
//! Separate `repoinit` processes working on the same store file are not: each
//! would load, apply and write its own copy. The store lock closes that gap.
//! It is held from load until the store has been written.
//!
//! # Storage
//!
//! - `<store>.lock` next to the store file, with an OS-level exclusive lock
//!
//! # Invariants
//!
//! - Acquisition is non-blocking and fails fast if another process holds it
//! - The lock is released on drop
//!
//! # Example
//!
//! ```no_run
//! use repoinit::core::lock::StoreLock;
//! use std::path::Path;
//!
//! let lock = StoreLock::acquire(Path::new("repository.json")).unwrap();
//! println!("holding {}", lock.path().display());
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("store is locked by another repoinit process: {0}")]
    AlreadyLocked(PathBuf),

    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on a store file.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    /// Lock file path for a store.
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "repository".into());
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Attempt to acquire the lock for `store_path`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(store_path: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(store_path);

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "store lock acquired");
                Ok(Self { path, file })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(path))
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_sits_next_to_store() {
        assert_eq!(
            StoreLock::lock_path(Path::new("/data/repo.json")),
            PathBuf::from("/data/repo.json.lock")
        );
    }

    #[test]
    fn acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("sub/repo.json");

        let lock = StoreLock::acquire(&store).expect("acquire");
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_fails() {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("repo.json");

        let _first = StoreLock::acquire(&store).expect("first acquire");
        assert!(matches!(
            StoreLock::acquire(&store),
            Err(LockError::AlreadyLocked(_))
        ));
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("repo.json");

        {
            let _lock = StoreLock::acquire(&store).expect("first acquire");
        }
        assert!(StoreLock::acquire(&store).is_ok());
    }
}
