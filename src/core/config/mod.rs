//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! amitree has two configuration scopes:
//! - **Global**: User-level settings (tool locations, AWS account, defaults)
//! - **Project**: Settings for one image tree, checked in next to it
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
//! 1. `$AMITREE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/amitree/config.toml`
//! 3. `~/.amitree/config.toml` (canonical write location)
//!
//! # Project Config Location
//!
//! `<project>/amitree.toml`
//!
//! # Example
//!
//! ```no_run
//! use amitree::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/project"))).unwrap();
//!
//! println!("Root label: {}", config.naming().root_label);
//! println!("Packer: {}", config.packer_binary());
//! println!("Mode: {}", config.build_mode());
//! ```

pub mod schema;

pub use schema::{
    AwsConfig, BuildDefaults, GlobalConfig, LayoutConfig, PackerConfig, ProjectConfig,
};

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::builder::packer::DEFAULT_TEMPLATE;
use crate::core::naming::NamingConvention;
use crate::engine::orchestrator::{BuildMode, FailurePolicy};

/// Environment variable overriding the global config location.
pub const CONFIG_ENV: &str = "AMITREE_CONFIG";

/// File name of the project config.
pub const PROJECT_CONFIG_FILE: &str = "amitree.toml";

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

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: project config overrides
/// global config, which overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if present)
    pub project: Option<ProjectConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the project config file (if loaded)
    project_path: Option<PathBuf>,
}

impl Config {
    /// Assemble a configuration from already-parsed scopes.
    pub fn new(global: GlobalConfig, project: Option<ProjectConfig>) -> Self {
        Self {
            global,
            project,
            global_path: None,
            project_path: None,
        }
    }

    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads `<project_dir>/amitree.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), project_dir)
    }

    /// Load configuration from an explicit global config file.
    pub fn load_from(
        global_path: Option<&Path>,
        project_dir: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let global = match global_path {
            Some(path) => Self::read_config::<GlobalConfig>(path)?,
            None => GlobalConfig::default(),
        };

        let (project, project_path) = match project_dir {
            Some(dir) => {
                let path = Self::project_config_path(dir);
                if path.exists() {
                    (Some(Self::read_config::<ProjectConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        debug!(
            global = ?global_path,
            project = ?project_path,
            "configuration loaded"
        );

        Ok(Config {
            global,
            project,
            global_path: global_path.map(Path::to_path_buf),
            project_path,
        })
    }

    /// Locate the global config file, if one exists.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $AMITREE_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/amitree/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("amitree/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.amitree/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".amitree/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a config file.
    fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.amitree/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".amitree/config.toml"))
    }

    /// Get the path of the project config.
    pub fn project_config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_CONFIG_FILE)
    }

    /// Write a new project config.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_project(
        project_dir: &Path,
        config: &ProjectConfig,
    ) -> Result<PathBuf, ConfigError> {
        let path = Self::project_config_path(project_dir);
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path));
        }
        config.validate()?;
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically (temp file, then rename).
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn project_packer(&self) -> Option<&PackerConfig> {
        self.project.as_ref().and_then(|p| p.packer.as_ref())
    }

    fn project_aws(&self) -> Option<&AwsConfig> {
        self.project.as_ref().and_then(|p| p.aws.as_ref())
    }

    fn project_build(&self) -> Option<&BuildDefaults> {
        self.project.as_ref().and_then(|p| p.build.as_ref())
    }

    /// The naming convention of the project layout.
    ///
    /// Layout is project-scoped; the global config cannot change it.
    pub fn naming(&self) -> NamingConvention {
        self.project
            .as_ref()
            .and_then(|p| p.layout.as_ref())
            .map(LayoutConfig::naming)
            .unwrap_or_default()
    }

    /// Get the packer executable.
    ///
    /// Defaults to "packer" if not configured.
    pub fn packer_binary(&self) -> &str {
        self.project_packer()
            .and_then(|p| p.binary.as_deref())
            .or_else(|| self.global.packer.as_ref().and_then(|p| p.binary.as_deref()))
            .unwrap_or("packer")
    }

    /// Get the packer template, relative to the project directory.
    ///
    /// Defaults to "ami_build.pkr.hcl" if not configured.
    pub fn packer_template(&self) -> &str {
        self.project_packer()
            .and_then(|p| p.template.as_deref())
            .or_else(|| {
                self.global
                    .packer
                    .as_ref()
                    .and_then(|p| p.template.as_deref())
            })
            .unwrap_or(DEFAULT_TEMPLATE)
    }

    /// Extra packer variables; project entries override global ones.
    pub fn packer_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        for packer in [self.global.packer.as_ref(), self.project_packer()]
            .into_iter()
            .flatten()
        {
            if let Some(extra) = &packer.vars {
                vars.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        vars
    }

    /// Get the AWS CLI executable.
    ///
    /// Defaults to "aws" if not configured.
    pub fn aws_binary(&self) -> &str {
        self.project_aws()
            .and_then(|a| a.binary.as_deref())
            .or_else(|| self.global.aws.as_ref().and_then(|a| a.binary.as_deref()))
            .unwrap_or("aws")
    }

    /// Get the image owners to query.
    ///
    /// Defaults to `["self"]` if not configured.
    pub fn aws_owners(&self) -> Vec<String> {
        self.project_aws()
            .and_then(|a| a.owners.clone())
            .or_else(|| self.global.aws.as_ref().and_then(|a| a.owners.clone()))
            .unwrap_or_else(|| vec!["self".to_string()])
    }

    /// Get the AWS region, if configured.
    pub fn aws_region(&self) -> Option<&str> {
        self.project_aws()
            .and_then(|a| a.region.as_deref())
            .or_else(|| self.global.aws.as_ref().and_then(|a| a.region.as_deref()))
    }

    /// Get the AWS profile, if configured.
    pub fn aws_profile(&self) -> Option<&str> {
        self.project_aws()
            .and_then(|a| a.profile.as_deref())
            .or_else(|| self.global.aws.as_ref().and_then(|a| a.profile.as_deref()))
    }

    /// Get the build mode.
    ///
    /// Defaults to single pass if not configured.
    pub fn build_mode(&self) -> BuildMode {
        self.project_build()
            .and_then(|b| b.mode)
            .or_else(|| self.global.build.as_ref().and_then(|b| b.mode))
            .unwrap_or_default()
    }

    /// Get the failure policy.
    ///
    /// Defaults to halt if not configured.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.project_build()
            .and_then(|b| b.on_failure)
            .or_else(|| self.global.build.as_ref().and_then(|b| b.on_failure))
            .unwrap_or_default()
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
