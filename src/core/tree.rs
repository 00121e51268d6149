//! core::tree
//!
//! In-memory image inheritance tree.
//!
//! # Architecture
//!
//! The tree mirrors the project's directory hierarchy:
//! - Every directory is a [`TreeNode::Branch`] keyed by its label
//! - A directory named after the scripts label (default `provisioners`) is a
//!   [`TreeNode::VersionLeaf`] holding the versions of its script files
//!
//! The tree is built incrementally by [`TreeBuilder::add_node`], one
//! directory at a time in top-down walk order, and is never mutated after
//! [`TreeBuilder::finish`].
//!
//! # Invariants
//!
//! - A node is either a leaf or a branch, never both
//! - A branch has at most one version leaf (the scripts label is unique)
//! - Version leaves only contain versions parsed from `<version>.<ext>` names
//!   spelled exactly as the naming convention writes them
//!
//! # Example
//!
//! ```
//! use amitree::core::naming::NamingConvention;
//! use amitree::core::tree::TreeBuilder;
//! use amitree::core::types::Version;
//!
//! let mut builder = TreeBuilder::new(NamingConvention::default());
//! builder.add_node("ami", &["base"], &[] as &[&str]).unwrap();
//! builder.add_node("ami/base", &["provisioners"], &[] as &[&str]).unwrap();
//! builder.add_node("ami/base/provisioners", &[] as &[&str], &["1.sh", "2.sh"]).unwrap();
//!
//! let tree = builder.finish();
//! let base = tree.find("ami/base").unwrap();
//! assert_eq!(base.latest_version("provisioners"), Some(Version::new(2)));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::naming::{NamingConvention, NamingError};
use super::types::Version;

/// Errors from tree construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid tree path '{0}'")]
    InvalidPath(String),

    /// A provisioner file name is not `<non-negative integer>.<extension>`.
    #[error("invalid provisioner file name '{file}' in '{path}': {reason}")]
    Parse {
        path: String,
        file: String,
        reason: String,
    },

    #[error("invalid label in '{path}': {source}")]
    InvalidLabel {
        path: String,
        #[source]
        source: NamingError,
    },

    #[error("'{path}' descends beneath a provisioner scripts directory")]
    NestedUnderScripts { path: String },
}

/// A node of the inheritance tree.
///
/// Serializes untagged: a leaf as a JSON array of versions, a branch as a
/// JSON object keyed by child label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Versions of the provisioner scripts of the parent branch.
    VersionLeaf(BTreeSet<Version>),
    /// A directory, keyed by child label.
    Branch(BTreeMap<String, TreeNode>),
}

impl TreeNode {
    fn empty_leaf() -> Self {
        TreeNode::VersionLeaf(BTreeSet::new())
    }

    fn empty_branch() -> Self {
        TreeNode::Branch(BTreeMap::new())
    }

    /// The children of a branch, or `None` for a leaf.
    pub fn children(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Branch(children) => Some(children),
            TreeNode::VersionLeaf(_) => None,
        }
    }

    /// The versions of a leaf, or `None` for a branch.
    pub fn versions(&self) -> Option<&BTreeSet<Version>> {
        match self {
            TreeNode::VersionLeaf(versions) => Some(versions),
            TreeNode::Branch(_) => None,
        }
    }

    /// The highest version in this branch's scripts leaf.
    ///
    /// Returns `None` for leaves, for branches without a scripts leaf and
    /// for branches whose scripts leaf is empty.
    pub fn latest_version(&self, scripts_label: &str) -> Option<Version> {
        self.children()?
            .get(scripts_label)?
            .versions()?
            .iter()
            .next_back()
            .copied()
    }
}

/// The finished inheritance tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InheritanceTree {
    root: BTreeMap<String, TreeNode>,
}

impl InheritanceTree {
    /// The top-level node for a label (normally the root label).
    pub fn get(&self, label: &str) -> Option<&TreeNode> {
        self.root.get(label)
    }

    /// Look up a node by slash-delimited path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let mut parts = path.split('/');
        let mut node = self.root.get(parts.next()?)?;
        for part in parts {
            node = node.children()?.get(part)?;
        }
        Some(node)
    }

    /// Whether the tree holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// Incrementally assembles an [`InheritanceTree`] from directory listings.
#[derive(Debug)]
pub struct TreeBuilder {
    naming: NamingConvention,
    root: BTreeMap<String, TreeNode>,
}

impl TreeBuilder {
    /// Create a builder with an empty tree.
    pub fn new(naming: NamingConvention) -> Self {
        Self {
            naming,
            root: BTreeMap::new(),
        }
    }

    /// Record one directory of the walk.
    ///
    /// `path` is the slash-delimited label sequence from the tree root to
    /// the directory, `child_labels` its subdirectories and `leaf_files` its
    /// files. Files only matter inside a scripts directory; subdirectories
    /// are ignored there.
    ///
    /// # Errors
    ///
    /// - [`TreeError::Parse`] if a script file name is malformed; fatal,
    ///   the tree must not be used to plan builds
    /// - [`TreeError::InvalidLabel`] if a directory label contains a separator
    /// - [`TreeError::NestedUnderScripts`] if `path` descends below a scripts
    ///   directory
    pub fn add_node<C, F>(
        &mut self,
        path: &str,
        child_labels: &[C],
        leaf_files: &[F],
    ) -> Result<(), TreeError>
    where
        C: AsRef<str>,
        F: AsRef<str>,
    {
        let naming = &self.naming;
        let child_labels: Vec<&str> = child_labels
            .iter()
            .map(|label| label.as_ref())
            .filter(|label| !naming.is_ignored(label))
            .collect();
        let leaf_files: Vec<&str> = leaf_files
            .iter()
            .map(|file| file.as_ref())
            .filter(|file| !naming.is_ignored(file))
            .collect();

        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        let Some((terminal, ancestors)) = parts.split_last() else {
            return Err(TreeError::InvalidPath(path.to_string()));
        };

        let check_label = |label: &str| -> Result<(), TreeError> {
            if naming.is_scripts_label(label) {
                return Ok(());
            }
            naming
                .validate_label(label)
                .map_err(|source| TreeError::InvalidLabel {
                    path: path.to_string(),
                    source,
                })
        };

        let mut level = &mut self.root;
        for part in ancestors {
            check_label(*part)?;
            let node = level
                .entry((*part).to_string())
                .or_insert_with(|| new_node(naming, part));
            level = match node {
                TreeNode::Branch(children) => children,
                TreeNode::VersionLeaf(_) => {
                    return Err(TreeError::NestedUnderScripts {
                        path: path.to_string(),
                    })
                }
            };
        }

        check_label(*terminal)?;

        let node = level
            .entry((*terminal).to_string())
            .or_insert_with(|| new_node(naming, terminal));
        match node {
            TreeNode::VersionLeaf(versions) => {
                for file in leaf_files {
                    versions.insert(parse_script_name(naming, path, file)?);
                }
            }
            TreeNode::Branch(children) => {
                for label in child_labels {
                    check_label(label)?;
                    children
                        .entry(label.to_string())
                        .or_insert_with(|| new_node(naming, label));
                }
            }
        }

        Ok(())
    }

    /// Finish building and hand out the immutable tree.
    pub fn finish(self) -> InheritanceTree {
        InheritanceTree { root: self.root }
    }
}

fn new_node(naming: &NamingConvention, label: &str) -> TreeNode {
    if naming.is_scripts_label(label) {
        TreeNode::empty_leaf()
    } else {
        TreeNode::empty_branch()
    }
}

/// Parse `<version>.<extension>` into its version.
///
/// The name must be exactly what [`NamingConvention::script_file_name`]
/// produces for that version, so the planned provisioner path always names
/// the file on disk. `007.sh` and `2.bash` (under `sh`) are rejected.
fn parse_script_name(
    naming: &NamingConvention,
    path: &str,
    file: &str,
) -> Result<Version, TreeError> {
    let parse_error = |reason: String| TreeError::Parse {
        path: path.to_string(),
        file: file.to_string(),
        reason,
    };

    let mut pieces = file.split('.');
    let (stem, extension) = match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(stem), Some(extension), None) => (stem, extension),
        _ => {
            return Err(parse_error(
                "expected exactly one '.' separating version and extension".into(),
            ))
        }
    };
    if extension.is_empty() {
        return Err(parse_error("missing extension".into()));
    }
    if extension != naming.script_extension {
        return Err(parse_error(format!(
            "expected extension '{}'",
            naming.script_extension
        )));
    }

    let version = stem
        .parse::<Version>()
        .map_err(|e| parse_error(e.to_string()))?;
    if stem != version.to_string() {
        return Err(parse_error(format!(
            "version has leading zeros, name it '{}'",
            naming.script_file_name(&version.to_string())
        )));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    fn builder() -> TreeBuilder {
        TreeBuilder::new(NamingConvention::default())
    }

    fn versions(values: &[u64]) -> BTreeSet<Version> {
        values.iter().copied().map(Version::new).collect()
    }

    #[test]
    fn builds_nested_branches_and_leaves() {
        let mut b = builder();
        b.add_node("ami", &["base"], NONE).unwrap();
        b.add_node("ami/base", &["provisioners", "web"], NONE).unwrap();
        b.add_node("ami/base/provisioners", NONE, &["1.sh", "2.sh"])
            .unwrap();
        b.add_node("ami/base/web", &["provisioners"], NONE).unwrap();
        b.add_node("ami/base/web/provisioners", NONE, &["1.sh"])
            .unwrap();
        let tree = b.finish();

        assert_eq!(
            tree.find("ami/base/provisioners").and_then(TreeNode::versions),
            Some(&versions(&[1, 2]))
        );
        assert_eq!(
            tree.find("ami/base/web/provisioners")
                .and_then(TreeNode::versions),
            Some(&versions(&[1]))
        );
        assert!(tree.find("ami").unwrap().children().is_some());
    }

    #[test]
    fn latest_version_is_maximum() {
        let mut b = builder();
        b.add_node("ami", &["provisioners"], NONE).unwrap();
        b.add_node("ami/provisioners", NONE, &["1.sh", "3.sh", "2.sh"])
            .unwrap();
        let tree = b.finish();
        assert_eq!(
            tree.get("ami").unwrap().latest_version("provisioners"),
            Some(Version::new(3))
        );
    }

    #[test]
    fn empty_scripts_dir_has_no_latest_version() {
        let mut b = builder();
        b.add_node("ami", &["provisioners"], NONE).unwrap();
        let tree = b.finish();
        assert_eq!(tree.get("ami").unwrap().latest_version("provisioners"), None);
    }

    #[test]
    fn ignored_names_are_dropped() {
        let mut b = builder();
        b.add_node("ami", &["base", ".DS_Store"], &[".DS_Store"])
            .unwrap();
        b.add_node("ami/base", &["provisioners"], &[".DS_Store"])
            .unwrap();
        b.add_node("ami/base/provisioners", NONE, &["1.sh", ".DS_Store"])
            .unwrap();
        let tree = b.finish();

        let ami = tree.get("ami").unwrap().children().unwrap();
        assert_eq!(ami.keys().collect::<Vec<_>>(), vec!["base"]);
        assert_eq!(
            tree.find("ami/base/provisioners").and_then(TreeNode::versions),
            Some(&versions(&[1]))
        );
    }

    #[test]
    fn revisiting_a_path_is_a_no_op() {
        let mut b = builder();
        b.add_node("ami", &["base"], NONE).unwrap();
        b.add_node("ami/base", &["provisioners"], NONE).unwrap();
        b.add_node("ami/base/provisioners", NONE, &["4.sh"]).unwrap();
        b.add_node("ami/base", &["provisioners"], NONE).unwrap();
        b.add_node("ami", &["base"], NONE).unwrap();
        let tree = b.finish();

        assert_eq!(
            tree.find("ami/base/provisioners").and_then(TreeNode::versions),
            Some(&versions(&[4]))
        );
    }

    #[test]
    fn intermediate_segments_are_created() {
        let mut b = builder();
        b.add_node("ami/base/web", &["provisioners"], NONE).unwrap();
        let tree = b.finish();
        assert!(tree.find("ami/base/web/provisioners").is_some());
    }

    #[test]
    fn scripts_dir_without_parent_listing_still_records_versions() {
        let mut b = builder();
        b.add_node("ami/base/provisioners", NONE, &["5.sh"]).unwrap();
        let tree = b.finish();
        assert_eq!(
            tree.find("ami/base").unwrap().latest_version("provisioners"),
            Some(Version::new(5))
        );
    }

    #[test]
    fn malformed_file_names_fail() {
        for bad in [
            "install.sh",
            "1",
            "1.tar.gz",
            "-1.sh",
            "1.",
            ".sh",
            "007.sh",
            "01.sh",
            "2.bash",
        ] {
            let mut b = builder();
            let err = b
                .add_node("ami/provisioners", NONE, &[bad])
                .unwrap_err();
            assert!(
                matches!(err, TreeError::Parse { ref file, .. } if file == bad),
                "unexpected result for {bad:?}: {err:?}"
            );
        }
    }

    #[test]
    fn labels_with_separators_are_rejected() {
        let mut b = builder();
        let err = b.add_node("ami", &["web-server"], NONE).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLabel { .. }));

        let mut b = builder();
        let err = b.add_node("ami/web_server", NONE, NONE).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLabel { .. }));
    }

    #[test]
    fn paths_below_scripts_are_rejected() {
        let mut b = builder();
        b.add_node("ami", &["provisioners"], NONE).unwrap();
        let err = b
            .add_node("ami/provisioners/extra", NONE, NONE)
            .unwrap_err();
        assert!(matches!(err, TreeError::NestedUnderScripts { .. }));
    }

    #[test]
    fn empty_path_segments_are_rejected() {
        let mut b = builder();
        assert_eq!(
            b.add_node("", NONE, NONE),
            Err(TreeError::InvalidPath(String::new()))
        );
        assert!(b.add_node("ami//base", NONE, NONE).is_err());
    }

    #[test]
    fn serializes_like_the_directory_layout() {
        let mut b = builder();
        b.add_node("ami", &["base"], NONE).unwrap();
        b.add_node("ami/base", &["provisioners"], NONE).unwrap();
        b.add_node("ami/base/provisioners", NONE, &["2.sh", "1.sh"])
            .unwrap();
        let json = serde_json::to_string(&b.finish()).unwrap();
        assert_eq!(json, r#"{"ami":{"base":{"provisioners":[1,2]}}}"#);
    }

    #[test]
    fn script_names_follow_configured_extension() {
        let naming = NamingConvention {
            script_extension: "ps1".into(),
            ..Default::default()
        };
        let mut b = TreeBuilder::new(naming.clone());
        b.add_node("ami/provisioners", NONE, &["4.ps1"]).unwrap();
        assert!(matches!(
            b.add_node("ami/provisioners", NONE, &["5.sh"]),
            Err(TreeError::Parse { .. })
        ));
    }

    #[test]
    fn padded_version_does_not_merge_with_plain_one() {
        let mut b = builder();
        let err = b
            .add_node("ami/provisioners", NONE, &["01.sh", "1.sh"])
            .unwrap_err();
        assert!(matches!(err, TreeError::Parse { ref file, .. } if file == "01.sh"));
    }
}
