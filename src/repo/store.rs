//! repo::store
//!
//! JSON file persistence for [`RepositoryState`].
//!
//! # Storage
//!
//! A store is one JSON document:
//!
//! ```json
//! { "format_version": 1, "saved_at": "2026-01-01T00:00:00Z", "state": { ... } }
//! ```
//!
//! A missing file is a fresh repository holding only built-in content.
//!
//! # Invariants
//!
//! - Writes go to a temp file in the same directory, are fsynced, then renamed
//! - Readers never observe a partially written document
//! - Documents with an unknown `format_version` are rejected
//!
//! Cross-process exclusion is the caller's job, see
//! [`StoreLock`](crate::core::lock::StoreLock).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::memory::{MemoryRepository, RepositoryState};
use crate::core::types::UtcTimestamp;

/// Current store document version.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write store '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("store '{path}' is not valid: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("store '{path}' has format version {found}, expected {FORMAT_VERSION}")]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

/// On-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub format_version: u32,
    pub saved_at: UtcTimestamp,
    pub state: RepositoryState,
}

/// A repository persisted to a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    state: RepositoryState,
    saved_at: Option<UtcTimestamp>,
}

impl FileStore {
    /// Open a store, falling back to a fresh state if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "store not found, starting fresh");
            return Ok(Self {
                path,
                state: RepositoryState::with_builtins(),
                saved_at: None,
            });
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let document: StoreDocument =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        if document.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                found: document.format_version,
            });
        }

        tracing::debug!(
            path = %path.display(),
            revision = document.state.revision,
            "store loaded"
        );
        Ok(Self {
            path,
            state: document.state,
            saved_at: Some(document.saved_at),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file existed when opened or has been written since.
    pub fn exists(&self) -> bool {
        self.saved_at.is_some()
    }

    /// Time of the last write, if any.
    pub fn saved_at(&self) -> Option<&UtcTimestamp> {
        self.saved_at.as_ref()
    }

    /// The loaded state.
    pub fn state(&self) -> &RepositoryState {
        &self.state
    }

    /// A repository seeded with the loaded state.
    pub fn repository(&self) -> MemoryRepository {
        MemoryRepository::from_state(self.state.clone())
    }

    /// Replace the stored state and write it to disk atomically.
    pub fn write(&mut self, state: RepositoryState) -> Result<(), StoreError> {
        let document = StoreDocument {
            format_version: FORMAT_VERSION,
            saved_at: UtcTimestamp::now(),
            state,
        };
        let content =
            serde_json::to_string_pretty(&document).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        self.write_atomic(content.as_bytes())?;

        tracing::debug!(
            path = %self.path.display(),
            revision = document.state.revision,
            "store written"
        );
        self.state = document.state;
        self.saved_at = Some(document.saved_at);
        Ok(())
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Write { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err(parent))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(write_err(&temp_path))?;
        file.write_all(bytes).map_err(write_err(&temp_path))?;
        file.sync_all().map_err(write_err(&temp_path))?;

        fs::rename(&temp_path, &self.path).map_err(write_err(&self.path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NodePath, QualifiedName};
    use crate::repo::Session;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_fresh() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("repo.json")).unwrap();
        assert!(!store.exists());
        assert_eq!(store.state(), &RepositoryState::with_builtins());
    }

    #[test]
    fn write_then_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/repo.json");
        let mut store = FileStore::open(&path).unwrap();

        let repo = store.repository();
        let mut session = repo.login();
        session
            .add_node(
                &NodePath::new("/content").unwrap(),
                &QualifiedName::new("nt:folder").unwrap(),
            )
            .unwrap();
        session.save().unwrap();
        store.write(repo.snapshot()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.exists());
        assert_eq!(reopened.state().revision, 1);
        assert_eq!(reopened.state().fingerprint(), repo.fingerprint());
    }

    #[test]
    fn corrupt_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repo.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repo.json");
        let mut store = FileStore::open(&path).unwrap();
        store.write(RepositoryState::with_builtins()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            content.replace("\"format_version\": 1", "\"format_version\": 99"),
        )
        .unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
