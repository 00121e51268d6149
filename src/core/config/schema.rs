//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$AMITREE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/amitree/config.toml`
//! 3. `~/.amitree/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `<project>/amitree.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the layout must form a decodable naming
//! convention).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::naming::NamingConvention;
use crate::engine::orchestrator::{BuildMode, FailurePolicy};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [packer]
/// binary = "/usr/local/bin/packer"
///
/// [aws]
/// region = "eu-west-1"
/// profile = "images"
///
/// [build]
/// mode = "fixed-point"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Packer defaults
    pub packer: Option<PackerConfig>,

    /// AWS CLI defaults
    pub aws: Option<AwsConfig>,

    /// Build defaults
    pub build: Option<BuildDefaults>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(packer) = &self.packer {
            packer.validate()?;
        }
        if let Some(aws) = &self.aws {
            aws.validate()?;
        }
        Ok(())
    }
}

/// Project configuration.
///
/// # Example
///
/// ```toml
/// [layout]
/// root = "images"
/// version_separator = "-"
/// node_separator = "_"
///
/// [packer]
/// template = "packer/build.pkr.hcl"
///
/// [packer.vars]
/// instance_type = "t3.large"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directory layout and naming
    pub layout: Option<LayoutConfig>,

    /// Packer overrides
    pub packer: Option<PackerConfig>,

    /// AWS CLI overrides
    pub aws: Option<AwsConfig>,

    /// Build overrides
    pub build: Option<BuildDefaults>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(layout) = &self.layout {
            layout
                .naming()
                .validate()
                .map_err(|e| ConfigError::InvalidValue(format!("invalid layout: {}", e)))?;
        }
        if let Some(packer) = &self.packer {
            packer.validate()?;
        }
        if let Some(aws) = &self.aws {
            aws.validate()?;
        }
        Ok(())
    }
}

/// Directory layout of a project.
///
/// Unset fields fall back to the default naming convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Root directory label (default: "ami")
    pub root: Option<String>,

    /// Scripts directory label (default: "provisioners")
    pub scripts: Option<String>,

    /// Provisioner script extension (default: "sh")
    pub extension: Option<String>,

    /// Separator between a label and its version (default: "-")
    pub version_separator: Option<String>,

    /// Separator between name segments (default: "_")
    pub node_separator: Option<String>,

    /// File names skipped while scanning (default: [".DS_Store"])
    pub ignore: Option<Vec<String>>,
}

impl LayoutConfig {
    /// The naming convention this layout describes.
    pub fn naming(&self) -> NamingConvention {
        let defaults = NamingConvention::default();
        NamingConvention {
            root_label: self.root.clone().unwrap_or(defaults.root_label),
            scripts_label: self.scripts.clone().unwrap_or(defaults.scripts_label),
            script_extension: self.extension.clone().unwrap_or(defaults.script_extension),
            version_separator: self
                .version_separator
                .clone()
                .unwrap_or(defaults.version_separator),
            node_separator: self
                .node_separator
                .clone()
                .unwrap_or(defaults.node_separator),
            ignore: self
                .ignore
                .as_ref()
                .map(|names| names.iter().cloned().collect())
                .unwrap_or(defaults.ignore),
        }
    }
}

/// Packer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackerConfig {
    /// Packer executable (default: "packer" on PATH)
    pub binary: Option<String>,

    /// Template path, relative to the project (default: "ami_build.pkr.hcl")
    pub template: Option<String>,

    /// Extra `-var` pairs passed to every build
    pub vars: Option<BTreeMap<String, String>>,
}

impl PackerConfig {
    /// Reserved variable names set by every build.
    pub const RESERVED_VARS: &'static [&'static str] =
        &["ami_name", "source_ami", "provisioner_script"];

    /// Validate the packer configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("packer.binary", self.binary.as_deref())?;
        non_empty("packer.template", self.template.as_deref())?;
        if let Some(vars) = &self.vars {
            for key in vars.keys() {
                if Self::RESERVED_VARS.contains(&key.as_str()) {
                    return Err(ConfigError::InvalidValue(format!(
                        "packer variable '{}' is set by amitree and cannot be overridden",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// AWS CLI settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    /// AWS CLI executable (default: "aws" on PATH)
    pub binary: Option<String>,

    /// Image owners to query (default: ["self"])
    pub owners: Option<Vec<String>>,

    /// Region passed as `--region`
    pub region: Option<String>,

    /// Profile passed as `--profile`
    pub profile: Option<String>,
}

impl AwsConfig {
    /// Validate the AWS configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("aws.binary", self.binary.as_deref())?;
        non_empty("aws.region", self.region.as_deref())?;
        non_empty("aws.profile", self.profile.as_deref())?;
        if let Some(owners) = &self.owners {
            if owners.is_empty() || owners.iter().any(|o| o.is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "aws.owners must list at least one non-empty owner".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Build command defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildDefaults {
    /// Processing mode ("single-pass" or "fixed-point")
    pub mode: Option<BuildMode>,

    /// Failure policy ("halt" or "continue")
    pub on_failure: Option<FailurePolicy>,
}

fn non_empty(field: &str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::InvalidValue(format!(
            "{} cannot be empty",
            field
        ))),
        _ => Ok(()),
    }
}
