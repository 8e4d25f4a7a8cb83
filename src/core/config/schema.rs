//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$REPOINIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repoinit/config.toml`
//! 3. `~/.repoinit/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `<dir>/repoinit.toml` (canonical).
//!
//! # Validation
//!
//! Values are validated after parsing: directory roots must be absolute
//! repository paths and type names must be qualified.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{NodePath, QualifiedName};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [directory]
/// users_path = "/home/users"
/// system_users_path = "/home/users/system"
///
/// [nodes]
/// default_primary_type = "nt:unstructured"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// User directory layout
    pub directory: Option<DirectoryConfig>,

    /// Node creation defaults
    pub nodes: Option<NodesConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(directory) = &self.directory {
            directory.validate()?;
        }
        if let Some(nodes) = &self.nodes {
            nodes.validate()?;
        }
        Ok(())
    }
}

/// Project configuration.
///
/// # Example
///
/// ```toml
/// store = "state/repository.json"
///
/// [directory]
/// system_users_path = "/home/users/system/app"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Store file, relative to the project directory
    pub store: Option<String>,

    /// User directory layout overrides
    pub directory: Option<DirectoryConfig>,

    /// Node creation overrides
    pub nodes: Option<NodesConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(store) = &self.store {
            if store.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "store cannot be empty".to_string(),
                ));
            }
        }
        if let Some(directory) = &self.directory {
            directory.validate()?;
        }
        if let Some(nodes) = &self.nodes {
            nodes.validate()?;
        }
        Ok(())
    }
}

/// Where principals live in the repository tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Root of regular users
    pub users_path: Option<String>,

    /// Root of service users
    pub system_users_path: Option<String>,
}

impl DirectoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let users = self
            .users_path
            .as_deref()
            .map(|p| parse_path("directory.users_path", p))
            .transpose()?;
        let system = self
            .system_users_path
            .as_deref()
            .map(|p| parse_path("directory.system_users_path", p))
            .transpose()?;

        if let (Some(users), Some(system)) = (users, system) {
            if users == system {
                return Err(ConfigError::InvalidValue(
                    "directory.users_path and directory.system_users_path must differ"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Node creation defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NodesConfig {
    /// Primary type for nodes created without an explicit type
    pub default_primary_type: Option<String>,
}

impl NodesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ty) = &self.default_primary_type {
            QualifiedName::new(ty.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid nodes.default_primary_type: {e}"))
            })?;
        }
        Ok(())
    }
}

pub(super) fn parse_path(key: &str, value: &str) -> Result<NodePath, ConfigError> {
    NodePath::new(value).map_err(|e| ConfigError::InvalidValue(format!("invalid {key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.directory.is_none());
            assert!(config.nodes.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                directory: Some(DirectoryConfig {
                    users_path: Some("/home/users".to_string()),
                    system_users_path: Some("/home/users/system".to_string()),
                }),
                nodes: Some(NodesConfig {
                    default_primary_type: Some("sling:Folder".to_string()),
                }),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }

        #[test]
        fn store_is_project_only() {
            let result: Result<GlobalConfig, _> = toml::from_str("store = \"x.json\"");
            assert!(result.is_err());
        }
    }

    mod project_config {
        use super::*;

        #[test]
        fn empty_store_rejected() {
            let config = ProjectConfig {
                store: Some("  ".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn reject_unknown_fields() {
            let toml = r#"
                store = "repo.json"
                unknown_field = true
            "#;

            let result: Result<ProjectConfig, _> = toml::from_str(toml);
            assert!(result.is_err());
        }
    }

    mod directory_config {
        use super::*;

        #[test]
        fn relative_path_rejected() {
            let config = DirectoryConfig {
                users_path: Some("home/users".to_string()),
                system_users_path: None,
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn equal_roots_rejected() {
            let config = DirectoryConfig {
                users_path: Some("/home/users".to_string()),
                system_users_path: Some("/home/users".to_string()),
            };
            assert!(config.validate().is_err());
        }
    }

    mod nodes_config {
        use super::*;

        #[test]
        fn unqualified_type_rejected() {
            let config = NodesConfig {
                default_primary_type: Some("unstructured".to_string()),
            };
            assert!(config.validate().is_err());
        }
    }
}
