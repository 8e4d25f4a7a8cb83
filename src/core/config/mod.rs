//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! repoinit has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Settings next to the scripts being applied
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$REPOINIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repoinit/config.toml`
//! 3. `~/.repoinit/config.toml`
//!
//! # Project Config Locations
//!
//! Searched in order:
//! 1. `<dir>/repoinit.toml` (canonical)
//! 2. `<dir>/.repoinit/config.toml` (compatibility, warns)
//!
//! # Example
//!
//! ```no_run
//! use repoinit::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//! let config = result.config;
//!
//! let options = config.processor_options().unwrap();
//! println!("Service users under {}", options.layout.system_users_path);
//! println!("Store: {}", config.store_path(Path::new("/path/to/project")).display());
//! ```

pub mod schema;

pub use schema::{DirectoryConfig, GlobalConfig, NodesConfig, ProjectConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::types::QualifiedName;
use crate::engine::principals::DirectoryLayout;
use crate::engine::processor::ProcessorOptions;

/// Default store file name, relative to the project directory.
pub const DEFAULT_STORE: &str = "repository.json";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: project values override global ones
/// field by field.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if found)
    pub project: Option<ProjectConfig>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads the project config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = Self::load_global()?;
        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir, &mut warnings)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(p) = &project {
            p.validate()?;
        }

        let config = Config {
            global,
            project,
            global_path,
            project_path,
        };
        // Each scope is valid on its own; check the merged layout too.
        config.processor_options()?;

        Ok(ConfigLoadResult { config, warnings })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        // 1. $REPOINIT_CONFIG
        if let Ok(path) = std::env::var("REPOINIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 2. $XDG_CONFIG_HOME/repoinit/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("repoinit/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 3. ~/.repoinit/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".repoinit/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    fn load_project(
        dir: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<ProjectConfig>, Option<PathBuf>), ConfigError> {
        let canonical = Self::project_config_path(dir);
        if canonical.exists() {
            let config = Self::read_config(&canonical)?;
            return Ok((Some(config), Some(canonical)));
        }

        let compat = dir.join(".repoinit/config.toml");
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please move to '{}'",
                    canonical.display()
                ),
                path: compat.clone(),
            });
            let config = Self::read_config(&compat)?;
            return Ok((Some(config), Some(compat)));
        }

        Ok((None, None))
    }

    fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Canonical project config path for a directory.
    pub fn project_config_path(dir: &Path) -> PathBuf {
        dir.join("repoinit.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn directory_value(&self, pick: impl Fn(&DirectoryConfig) -> Option<&String>) -> Option<&str> {
        let project = self
            .project
            .as_ref()
            .and_then(|p| p.directory.as_ref())
            .and_then(&pick);
        let global = self.global.directory.as_ref().and_then(&pick);
        project.or(global).map(String::as_str)
    }

    /// Root of regular users.
    ///
    /// Defaults to `/home/users`.
    pub fn users_path(&self) -> &str {
        self.directory_value(|d| d.users_path.as_ref())
            .unwrap_or(DirectoryLayout::DEFAULT_USERS_PATH)
    }

    /// Root of service users.
    ///
    /// Defaults to `/home/users/system`.
    pub fn system_users_path(&self) -> &str {
        self.directory_value(|d| d.system_users_path.as_ref())
            .unwrap_or(DirectoryLayout::DEFAULT_SYSTEM_USERS_PATH)
    }

    /// Primary type for nodes created without one.
    ///
    /// Defaults to `nt:unstructured`.
    pub fn default_primary_type(&self) -> &str {
        let project = self
            .project
            .as_ref()
            .and_then(|p| p.nodes.as_ref())
            .and_then(|n| n.default_primary_type.as_deref());
        let global = self
            .global
            .nodes
            .as_ref()
            .and_then(|n| n.default_primary_type.as_deref());
        project
            .or(global)
            .unwrap_or(ProcessorOptions::DEFAULT_PRIMARY_TYPE)
    }

    /// Store file for a project directory.
    ///
    /// Relative `store` values resolve against `project_dir`.
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        let store = self
            .project
            .as_ref()
            .and_then(|p| p.store.as_deref())
            .unwrap_or(DEFAULT_STORE);
        project_dir.join(store)
    }

    /// Processor options with precedence applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the merged layout is invalid.
    pub fn processor_options(&self) -> Result<ProcessorOptions, ConfigError> {
        let users_path = schema::parse_path("directory.users_path", self.users_path())?;
        let system_users_path =
            schema::parse_path("directory.system_users_path", self.system_users_path())?;
        if users_path == system_users_path {
            return Err(ConfigError::InvalidValue(
                "directory.users_path and directory.system_users_path must differ".to_string(),
            ));
        }
        let default_primary_type =
            QualifiedName::new(self.default_primary_type()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid nodes.default_primary_type: {e}"))
            })?;

        Ok(ProcessorOptions {
            layout: DirectoryLayout {
                users_path,
                system_users_path,
            },
            default_primary_type,
        })
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}
