//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`NodePath`] - Validated absolute repository path
//! - [`QualifiedName`] - `prefix:name` schema name (node types, mixins, privileges)
//! - [`PrincipalId`] - Validated principal identifier
//! - [`UtcTimestamp`] - RFC3339 timestamp
//! - [`Fingerprint`] - Repository state hash
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so the reconcilers never see a relative path
//! or an unqualified type name.
//!
//! # Examples
//!
//! ```
//! use repoinit::core::types::{NodePath, QualifiedName, PrincipalId};
//!
//! let path = NodePath::new("/content/site").unwrap();
//! assert_eq!(path.name(), "site");
//!
//! let ty = QualifiedName::new("nt:folder").unwrap();
//! assert_eq!(ty.prefix(), "nt");
//!
//! assert!(NodePath::new("relative/path").is_err());
//! assert!(QualifiedName::new("unqualified").is_err());
//! assert!(PrincipalId::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid qualified name: {0}")]
    InvalidName(String),

    #[error("invalid principal id: {0}")]
    InvalidPrincipalId(String),
}

/// A validated absolute repository path.
///
/// Paths must:
/// - Start with `/`
/// - Not end with `/` (except the root path itself)
/// - Not contain empty segments, `.` or `..`
/// - Not contain `[`, `]`, `|`, `*` or control characters
///
/// # Example
///
/// ```
/// use repoinit::core::types::NodePath;
///
/// let path = NodePath::new("/a/b/c").unwrap();
/// assert_eq!(path.parent().unwrap().as_str(), "/a/b");
/// assert_eq!(path.depth(), 3);
///
/// assert!(NodePath::new("/a//b").is_err());
/// assert!(NodePath::new("/a/../b").is_err());
/// assert!(NodePath::root().is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

/// Characters no path segment may contain.
const INVALID_SEGMENT_CHARS: [char; 4] = ['[', ']', '|', '*'];

impl NodePath {
    /// Create a new validated path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the path is not a well-formed
    /// absolute path.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Wrap a built-in default path.
    ///
    /// Only for constants whose validity is covered by tests.
    pub(crate) fn from_static(path: &'static str) -> Self {
        Self(path.to_string())
    }

    fn validate(path: &str) -> Result<(), TypeError> {
        if path.is_empty() {
            return Err(TypeError::InvalidPath("path cannot be empty".into()));
        }
        if !path.starts_with('/') {
            return Err(TypeError::InvalidPath(format!(
                "path must be absolute: '{path}'"
            )));
        }
        if path == "/" {
            return Ok(());
        }
        if path.ends_with('/') {
            return Err(TypeError::InvalidPath(format!(
                "path cannot end with '/': '{path}'"
            )));
        }

        for segment in path[1..].split('/') {
            if segment.is_empty() {
                return Err(TypeError::InvalidPath(format!(
                    "path cannot contain empty segments: '{path}'"
                )));
            }
            if segment == "." || segment == ".." {
                return Err(TypeError::InvalidPath(format!(
                    "path cannot contain '.' or '..' segments: '{path}'"
                )));
            }
            if segment.trim() != segment {
                return Err(TypeError::InvalidPath(format!(
                    "segment '{segment}' has surrounding whitespace"
                )));
            }
            if let Some(c) = segment
                .chars()
                .find(|c| INVALID_SEGMENT_CHARS.contains(c) || c.is_control())
            {
                return Err(TypeError::InvalidPath(format!(
                    "segment '{segment}' contains invalid character {c:?}"
                )));
            }
        }

        Ok(())
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The last path segment (empty for the root).
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append a single segment.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if `name` is not a valid segment.
    pub fn child(&self, name: &str) -> Result<NodePath, TypeError> {
        if name.contains('/') {
            return Err(TypeError::InvalidPath(format!(
                "child name cannot contain '/': '{name}'"
            )));
        }
        if self.is_root() {
            Self::new(format!("/{name}"))
        } else {
            Self::new(format!("{}/{name}", self.0))
        }
    }

    /// Append a relative path of one or more segments.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the joined path is invalid.
    pub fn join(&self, relative: &str) -> Result<NodePath, TypeError> {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            return Ok(self.clone());
        }
        if self.is_root() {
            Self::new(format!("/{relative}"))
        } else {
            Self::new(format!("{}/{relative}", self.0))
        }
    }

    /// Proper ancestors from the topmost non-root segment down to the parent.
    ///
    /// # Example
    ///
    /// ```
    /// use repoinit::core::types::NodePath;
    ///
    /// let path = NodePath::new("/a/b/c").unwrap();
    /// let ancestors: Vec<String> = path.ancestors().iter().map(|p| p.to_string()).collect();
    /// assert_eq!(ancestors, vec!["/a", "/a/b"]);
    /// ```
    pub fn ancestors(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            out.push(path);
        }
        out.reverse();
        out
    }

    /// Check if this path equals `other` or lies below it.
    ///
    /// Segment boundaries are respected: `/a/bc` is not under `/a/b`.
    pub fn is_within(&self, other: &NodePath) -> bool {
        if other.is_root() || self == other {
            return true;
        }
        self.0
            .strip_prefix(other.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodePath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `prefix:name` schema name.
///
/// Used for node types, mixins and privileges. Both halves must be
/// non-empty and free of whitespace and CND punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Create a new validated qualified name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidName` if the name is not `prefix:local`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Wrap a built-in constant.
    ///
    /// Only for names in `repo::builtin`, whose validity is covered by tests.
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let Some((prefix, local)) = name.split_once(':') else {
            return Err(TypeError::InvalidName(format!(
                "'{name}' is missing a namespace prefix"
            )));
        };
        if prefix.is_empty() || local.is_empty() {
            return Err(TypeError::InvalidName(format!(
                "'{name}' must have a non-empty prefix and local name"
            )));
        }
        if local.contains(':') {
            return Err(TypeError::InvalidName(format!(
                "'{name}' contains more than one ':'"
            )));
        }
        const INVALID_CHARS: [char; 10] = ['/', '[', ']', '<', '>', ',', '\'', '"', '(', ')'];
        if let Some(c) = name
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || INVALID_CHARS.contains(c))
        {
            return Err(TypeError::InvalidName(format!(
                "'{name}' contains invalid character {c:?}"
            )));
        }
        Ok(())
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &str {
        self.0.split_once(':').map(|(p, _)| p).unwrap_or_default()
    }

    /// The local part after the prefix.
    pub fn local_name(&self) -> &str {
        self.0.split_once(':').map(|(_, l)| l).unwrap_or_default()
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.0
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated principal identifier.
///
/// Ids are case-sensitive and non-empty. Every id must also be usable as
/// the last segment of the principal's home path, so `/`, `,`, `[`, `]`,
/// `|`, `*`, whitespace and control characters are rejected, as are `.`
/// and `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a new validated principal id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPrincipalId` if the id is malformed.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidPrincipalId(
                "principal id cannot be empty".into(),
            ));
        }
        if id == "." || id == ".." {
            return Err(TypeError::InvalidPrincipalId(format!(
                "'{id}' is not a valid principal id"
            )));
        }
        if let Some(c) = id.chars().find(|c| {
            *c == '/'
                || *c == ','
                || INVALID_SEGMENT_CHARS.contains(c)
                || c.is_whitespace()
                || c.is_control()
        }) {
            return Err(TypeError::InvalidPrincipalId(format!(
                "'{id}' contains invalid character {c:?}"
            )));
        }
        Ok(Self(id))
    }

    /// First character, used to shard regular user folders.
    ///
    /// Ids starting with `.` shard to `_`, since `.` is not a segment.
    pub fn shard(&self) -> &str {
        if self.0.starts_with('.') {
            return "_";
        }
        let end = self.0.chars().next().map(char::len_utf8).unwrap_or(0);
        &self.0[..end]
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PrincipalId> for String {
    fn from(id: PrincipalId) -> Self {
        id.0
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable SHA-256 hash over repository state.
///
/// Two states with the same fingerprint hold the same nodes, schema,
/// principals and access control entries.
///
/// # Example
///
/// ```
/// use repoinit::core::types::Fingerprint;
///
/// let a = Fingerprint::of_bytes(b"state");
/// let b = Fingerprint::of_bytes(b"state");
/// assert_eq!(a, b);
/// assert_eq!(a.short(8).len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash a canonical byte representation.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Abbreviated form for display.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
