//! core::naming
//!
//! Image naming convention.
//!
//! # Composite Names
//!
//! Every image is named after its own directory label, optionally suffixed
//! with the latest provisioner version, followed by the names of all its
//! ancestors (self first, root last):
//!
//! ```text
//! ami/base/provisioners/{1,2}.sh      -> base-2_ami
//! ami/base/web/provisioners/1.sh      -> web-1_base-2_ami
//! ```
//!
//! The separators, the root label, the scripts directory name and the
//! ignore set are all carried by [`NamingConvention`] so callers never rely
//! on ambient constants.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Version;

/// Default root directory of the inheritance tree.
pub const DEFAULT_ROOT_LABEL: &str = "ami";
/// Default name of the directory holding provisioner scripts.
pub const DEFAULT_SCRIPTS_LABEL: &str = "provisioners";
/// Default extension of provisioner scripts.
pub const DEFAULT_SCRIPT_EXTENSION: &str = "sh";
/// Default separator between a label and its version.
pub const DEFAULT_VERSION_SEPARATOR: &str = "-";
/// Default separator between the segments of a composite name.
pub const DEFAULT_NODE_SEPARATOR: &str = "_";

/// Errors from naming validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} cannot contain '/': '{value}'")]
    ContainsSlash { field: &'static str, value: String },

    #[error("separators must not overlap: version '{version}', node '{node}'")]
    OverlappingSeparators { version: String, node: String },

    #[error("label '{label}' contains the {which} separator '{separator}'")]
    LabelContainsSeparator {
        label: String,
        which: &'static str,
        separator: String,
    },
}

/// The naming convention shared by tree building and plan compilation.
///
/// # Example
///
/// ```
/// use amitree::core::naming::NamingConvention;
/// use amitree::core::types::Version;
///
/// let naming = NamingConvention::default();
/// assert_eq!(naming.own_name("base", Some(Version::new(2))), "base-2");
/// assert_eq!(naming.own_name("ami", None), "ami");
/// assert_eq!(naming.join_segments(["web-1", "base-2", "ami"]), "web-1_base-2_ami");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    pub root_label: String,
    pub scripts_label: String,
    pub script_extension: String,
    pub version_separator: String,
    pub node_separator: String,
    /// Stray file names (e.g. `.DS_Store`) dropped before processing.
    pub ignore: BTreeSet<String>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            scripts_label: DEFAULT_SCRIPTS_LABEL.to_string(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            version_separator: DEFAULT_VERSION_SEPARATOR.to_string(),
            node_separator: DEFAULT_NODE_SEPARATOR.to_string(),
            ignore: [".DS_Store".to_string()].into_iter().collect(),
        }
    }
}

impl NamingConvention {
    /// Validate the convention.
    ///
    /// # Errors
    ///
    /// Returns a `NamingError` if any field is empty, contains `/`, or the
    /// two separators overlap (one contains the other).
    pub fn validate(&self) -> Result<(), NamingError> {
        let fields = [
            ("root_label", &self.root_label),
            ("scripts_label", &self.scripts_label),
            ("script_extension", &self.script_extension),
            ("version_separator", &self.version_separator),
            ("node_separator", &self.node_separator),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(NamingError::Empty { field });
            }
            if value.contains('/') {
                return Err(NamingError::ContainsSlash {
                    field,
                    value: value.clone(),
                });
            }
        }

        if self.version_separator.contains(&self.node_separator)
            || self.node_separator.contains(&self.version_separator)
        {
            return Err(NamingError::OverlappingSeparators {
                version: self.version_separator.clone(),
                node: self.node_separator.clone(),
            });
        }

        self.validate_label(&self.root_label)?;
        self.validate_label(&self.scripts_label)
    }

    /// Check that a directory label can appear inside a composite name.
    ///
    /// A label containing either separator could not be decoded back into
    /// its directory path.
    pub fn validate_label(&self, label: &str) -> Result<(), NamingError> {
        if label.is_empty() {
            return Err(NamingError::Empty { field: "label" });
        }
        for (which, separator) in [
            ("version", &self.version_separator),
            ("node", &self.node_separator),
        ] {
            if label.contains(separator.as_str()) {
                return Err(NamingError::LabelContainsSeparator {
                    label: label.to_string(),
                    which,
                    separator: separator.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether a file or directory name belongs to the ignore set.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.contains(name)
    }

    /// Whether a label names the provisioner scripts directory.
    pub fn is_scripts_label(&self, label: &str) -> bool {
        label == self.scripts_label
    }

    /// The segment naming one node: `label` or `label<sep>version`.
    pub fn own_name(&self, label: &str, version: Option<Version>) -> String {
        match version {
            Some(v) => format!("{}{}{}", label, self.version_separator, v),
            None => label.to_string(),
        }
    }

    /// Join segments (self first) into a composite name.
    pub fn join_segments<I, S>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(&self.node_separator)
    }

    /// Split a composite name into its segments (self first).
    pub fn split_segments<'a>(&self, name: &'a str) -> Vec<&'a str> {
        name.split(self.node_separator.as_str()).collect()
    }

    /// Number of node separators in a composite name.
    pub fn depth(&self, name: &str) -> usize {
        name.matches(self.node_separator.as_str()).count()
    }

    /// Split a segment into its label and version text, if it has one.
    pub fn split_version<'a>(&self, segment: &'a str) -> Option<(&'a str, &'a str)> {
        segment.split_once(self.version_separator.as_str())
    }

    /// Strip a segment's version suffix, leaving the directory label.
    pub fn strip_version<'a>(&self, segment: &'a str) -> &'a str {
        self.split_version(segment)
            .map(|(label, _)| label)
            .unwrap_or(segment)
    }

    /// File name of a provisioner script for a version.
    pub fn script_file_name(&self, version: &str) -> String {
        format!("{}.{}", version, self.script_extension)
    }
}
