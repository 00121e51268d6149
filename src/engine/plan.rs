//! engine::plan
//!
//! Deterministic build plan generation.
//!
//! # Architecture
//!
//! The plan is the sole intermediate representation between the scanned
//! inheritance tree and the orchestrator. Compilation runs in three stages:
//!
//! 1. **Derive**: walk the tree in preorder, producing one composite name per
//!    branch (self first, ancestors after, root last)
//! 2. **Filter**: drop names with fewer than two node separators; the root
//!    and its direct children are base images supplied externally
//! 3. **Decode**: turn each surviving name back into a [`BuildStep`],
//!    dropping names whose own segment carries no version
//!
//! # Invariants
//!
//! - The compiler does not perform I/O and does not mutate the tree
//! - A step's `source_name` has exactly one segment fewer than its `name`
//! - Steps are in preorder: an ancestor's step precedes every descendant's
//!
//! # Example
//!
//! ```
//! use amitree::core::naming::NamingConvention;
//! use amitree::core::tree::TreeBuilder;
//! use amitree::engine::plan::compile;
//!
//! let naming = NamingConvention::default();
//! let mut builder = TreeBuilder::new(naming.clone());
//! let none: &[&str] = &[];
//! builder.add_node("ami", &["base"], none).unwrap();
//! builder.add_node("ami/base", &["provisioners", "web"], none).unwrap();
//! builder.add_node("ami/base/provisioners", none, &["1.sh", "2.sh"]).unwrap();
//! builder.add_node("ami/base/web", &["provisioners"], none).unwrap();
//! builder.add_node("ami/base/web/provisioners", none, &["1.sh"]).unwrap();
//!
//! let plan = compile(&builder.finish(), &naming).unwrap();
//! assert_eq!(plan.len(), 1);
//! let step = &plan.steps()[0];
//! assert_eq!(step.name, "web-1_base-2_ami");
//! assert_eq!(step.source_name, "base-2_ami");
//! assert_eq!(step.provisioner_path, "ami/base/web/provisioners/1.sh");
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::naming::NamingConvention;
use crate::core::tree::{InheritanceTree, TreeNode};

/// Errors from plan compilation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("inheritance tree has no root node '{0}'")]
    MissingRoot(String),
}

/// One image to build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildStep {
    /// Composite name of the image to build (self first, root last).
    pub name: String,
    /// Composite name of the image it is built from.
    pub source_name: String,
    /// Provisioner script, relative to the project directory.
    pub provisioner_path: String,
}

impl BuildStep {
    /// Decode a composite name into a build step.
    ///
    /// Returns `None` when the name's own segment carries no version: the
    /// image has no provisioner script to build it with.
    ///
    /// # Example
    ///
    /// ```
    /// use amitree::core::naming::NamingConvention;
    /// use amitree::engine::plan::BuildStep;
    ///
    /// let naming = NamingConvention::default();
    /// let step = BuildStep::decode(&naming, "db-3_base-2_ami").unwrap();
    /// assert_eq!(step.source_name, "base-2_ami");
    /// assert_eq!(step.provisioner_path, "ami/base/db/provisioners/3.sh");
    ///
    /// assert!(BuildStep::decode(&naming, "db_base-2_ami").is_none());
    /// ```
    pub fn decode(naming: &NamingConvention, name: &str) -> Option<Self> {
        let segments = naming.split_segments(name);
        let (own, ancestors) = segments.split_first()?;
        let (label, version) = naming.split_version(own)?;

        // Ancestors are stored nearest first; the path runs root first.
        let mut provisioner_path = String::new();
        for segment in ancestors.iter().rev() {
            provisioner_path.push_str(naming.strip_version(segment));
            provisioner_path.push('/');
        }
        provisioner_path.push_str(&format!(
            "{}/{}/{}",
            label,
            naming.scripts_label,
            naming.script_file_name(version)
        ));

        Some(Self {
            name: name.to_string(),
            source_name: naming.join_segments(ancestors),
            provisioner_path,
        })
    }

    /// Human-readable description of the step.
    pub fn description(&self) -> String {
        format!(
            "build {} from {} with {}",
            self.name, self.source_name, self.provisioner_path
        )
    }
}

/// An ordered, immutable sequence of build steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    steps: Vec<BuildStep>,
}

impl BuildPlan {
    /// Create a plan from steps already in build order.
    pub fn new(steps: Vec<BuildStep>) -> Self {
        Self { steps }
    }

    /// The steps in build order.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Iterate over the steps in build order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter()
    }

    /// Check if the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Compute a digest of the plan for change detection.
    ///
    /// Equal plans always have equal digests.
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.steps).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Index of the step producing each step's source image.
    ///
    /// `None` means the source is not built by this plan and must already
    /// exist in the registry.
    pub fn dependencies(&self) -> Vec<Option<usize>> {
        self.steps
            .iter()
            .map(|step| {
                self.steps
                    .iter()
                    .position(|candidate| candidate.name == step.source_name)
            })
            .collect()
    }

    /// Source images the plan relies on but never builds.
    pub fn external_sources(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .zip(self.dependencies())
            .filter(|(_, producer)| producer.is_none())
            .map(|(step, _)| step.source_name.as_str())
            .collect()
    }

    /// Format the plan for preview.
    pub fn preview(&self) -> String {
        if self.is_empty() {
            return "build plan: no images to build".to_string();
        }

        let mut lines = vec![format!("build plan ({} steps):", self.len())];
        for (i, step) in self.steps.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, step.description()));
        }
        lines.join("\n")
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a BuildStep;
    type IntoIter = std::slice::Iter<'a, BuildStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Compile the inheritance tree into a build plan.
///
/// # Errors
///
/// Returns `CompileError::MissingRoot` if the tree has no node at the
/// configured root label.
pub fn compile(tree: &InheritanceTree, naming: &NamingConvention) -> Result<BuildPlan, CompileError> {
    let root = tree
        .get(&naming.root_label)
        .ok_or_else(|| CompileError::MissingRoot(naming.root_label.clone()))?;

    let steps = derive_names(naming, &naming.root_label, root)
        .iter()
        .filter(|name| naming.depth(name) >= 2)
        .filter_map(|name| BuildStep::decode(naming, name))
        .collect();

    Ok(BuildPlan::new(steps))
}

/// Composite names of `node` and all its descendant branches, in preorder.
///
/// The node's own name comes first; every descendant name ends with the
/// node's own name, so the root-most segment is always last.
pub fn derive_names(naming: &NamingConvention, label: &str, node: &TreeNode) -> Vec<String> {
    let own = naming.own_name(label, node.latest_version(&naming.scripts_label));

    let mut names = vec![own.clone()];
    if let Some(children) = node.children() {
        for (child_label, child) in children {
            if child.versions().is_some() {
                continue;
            }
            names.extend(
                derive_names(naming, child_label, child)
                    .into_iter()
                    .map(|descendant| naming.join_segments([descendant.as_str(), own.as_str()])),
            );
        }
    }
    names
}
