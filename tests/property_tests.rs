//! Property-based tests for plan compilation.
//!
//! These tests use proptest to generate arbitrary image trees and verify the
//! plan invariants hold for every one of them.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use amitree::core::naming::NamingConvention;
use amitree::core::tree::{InheritanceTree, TreeBuilder};
use amitree::core::types::Version;
use amitree::engine::plan::{compile, BuildPlan};

const NONE: &[&str] = &[];

/// A generated image directory.
#[derive(Debug, Clone)]
struct Dir {
    versions: BTreeSet<u64>,
    children: Vec<Dir>,
}

/// Strategy for generating image directories up to four levels deep.
fn dir() -> impl Strategy<Value = Dir> {
    let versions = prop::collection::btree_set(0u64..20, 0..3);
    let leaf = versions.clone().prop_map(|versions| Dir {
        versions,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 40, 4, move |inner| {
        (versions.clone(), prop::collection::vec(inner, 0..4))
            .prop_map(|(versions, children)| Dir { versions, children })
    })
}

/// Strategy for a root directory holding at least one image.
fn root() -> impl Strategy<Value = Dir> {
    prop::collection::vec(dir(), 1..4).prop_map(|children| Dir {
        versions: BTreeSet::new(),
        children,
    })
}

/// Feed a generated directory to the builder the way a top-down walk would.
fn add_dir(builder: &mut TreeBuilder, naming: &NamingConvention, path: &str, dir: &Dir) {
    let mut labels: Vec<String> = (0..dir.children.len()).map(|i| format!("n{}", i)).collect();
    if !dir.versions.is_empty() {
        labels.push(naming.scripts_label.clone());
    }
    builder.add_node(path, &labels, NONE).unwrap();

    if !dir.versions.is_empty() {
        let files: Vec<String> = dir
            .versions
            .iter()
            .map(|v| naming.script_file_name(&v.to_string()))
            .collect();
        let scripts = format!("{}/{}", path, naming.scripts_label);
        builder.add_node(&scripts, NONE, &files).unwrap();
    }

    for (i, child) in dir.children.iter().enumerate() {
        add_dir(builder, naming, &format!("{}/n{}", path, i), child);
    }
}

fn build_tree(naming: &NamingConvention, root: &Dir) -> InheritanceTree {
    let mut builder = TreeBuilder::new(naming.clone());
    add_dir(&mut builder, naming, &naming.root_label, root);
    builder.finish()
}

/// Paths (from the root) of every directory at least two levels below it
/// that holds scripts, mapped to its highest version.
fn buildable(root: &Dir, path: &str, depth: usize, out: &mut BTreeMap<String, u64>) {
    if depth >= 2 {
        if let Some(max) = root.versions.iter().next_back() {
            out.insert(path.to_string(), *max);
        }
    }
    for (i, child) in root.children.iter().enumerate() {
        buildable(child, &format!("{}/n{}", path, i), depth + 1, out);
    }
}

fn compile_generated(root: &Dir) -> (NamingConvention, InheritanceTree, BuildPlan) {
    let naming = NamingConvention::default();
    let tree = build_tree(&naming, root);
    let plan = compile(&tree, &naming).unwrap();
    (naming, tree, plan)
}

proptest! {
    /// Every step that builds on another planned step comes after it.
    #[test]
    fn producers_precede_consumers(root in root()) {
        let (_, _, plan) = compile_generated(&root);

        for (i, step) in plan.steps().iter().enumerate() {
            if let Some(j) = plan.steps().iter().position(|s| s.name == step.source_name) {
                prop_assert!(j < i, "{} planned before its source {}", step.name, step.source_name);
            }
        }
    }

    /// Each step's provisioner path names a real scripts directory and its
    /// highest version.
    #[test]
    fn provisioner_paths_match_tree(root in root()) {
        let (naming, tree, plan) = compile_generated(&root);

        for step in &plan {
            let (dir, file) = step.provisioner_path.rsplit_once('/').unwrap();
            let (image_dir, scripts) = dir.rsplit_once('/').unwrap();
            prop_assert_eq!(scripts, naming.scripts_label.as_str());

            let node = tree.find(image_dir);
            prop_assert!(node.is_some(), "no directory {}", image_dir);
            let latest = node.unwrap().latest_version(&naming.scripts_label).unwrap();
            prop_assert_eq!(file.to_string(), naming.script_file_name(&latest.to_string()));
        }
    }

    /// The plan holds exactly one step per versioned image below depth one.
    #[test]
    fn plan_covers_every_buildable_image(root in root()) {
        let (naming, _, plan) = compile_generated(&root);

        let mut expected = BTreeMap::new();
        buildable(&root, &naming.root_label, 0, &mut expected);

        let planned: BTreeMap<String, u64> = plan
            .iter()
            .map(|step| {
                let (dir, file) = step.provisioner_path.rsplit_once('/').unwrap();
                let image_dir = dir.rsplit_once('/').unwrap().0.to_string();
                let version: Version = file.split('.').next().unwrap().parse().unwrap();
                (image_dir, version.get())
            })
            .collect();

        prop_assert_eq!(planned.len(), plan.len());
        prop_assert_eq!(planned, expected);
    }

    /// A script file is either rejected or planned under its own name, so
    /// padded versions and foreign extensions never yield a missing path.
    #[test]
    fn accepted_script_names_are_planned_verbatim(
        padding in 0usize..3,
        n in 0u64..1000,
        extension in prop::sample::select(vec!["sh", "bash", "SH"]),
    ) {
        let naming = NamingConvention::default();
        let file = format!("{}{}.{}", "0".repeat(padding), n, extension);
        let canonical = naming.script_file_name(&n.to_string());

        let mut builder = TreeBuilder::new(naming.clone());
        builder.add_node("ami/base/provisioners", NONE, &["1.sh"]).unwrap();
        let added = builder.add_node("ami/base/web/provisioners", NONE, &[file.as_str()]);

        if file == canonical {
            prop_assert!(added.is_ok(), "rejected {}", file);
            let plan = compile(&builder.finish(), &naming).unwrap();
            prop_assert_eq!(plan.len(), 1);
            prop_assert_eq!(
                plan.steps()[0].provisioner_path.clone(),
                format!("ami/base/web/provisioners/{}", file)
            );
        } else {
            prop_assert!(added.is_err(), "accepted {}", file);
        }
    }

    /// A step's name is its own segment followed by its source's name.
    #[test]
    fn names_extend_their_source(root in root()) {
        let (naming, _, plan) = compile_generated(&root);

        for step in &plan {
            let suffix = format!("{}{}", naming.node_separator, step.source_name);
            prop_assert!(step.name.ends_with(&suffix));
            prop_assert!(naming.depth(&step.name) >= 2);
        }
    }

    /// Compiling the same tree twice gives the same plan and digest.
    #[test]
    fn compilation_is_deterministic(root in root()) {
        let (naming, tree, plan) = compile_generated(&root);
        let again = compile(&tree, &naming).unwrap();
        prop_assert_eq!(plan.digest(), again.digest());
        prop_assert_eq!(plan, again);
    }

    /// Version strings of digits always parse to their numeric value.
    #[test]
    fn version_parses_digits(n in 0u64..u64::MAX) {
        let version: Version = n.to_string().parse().unwrap();
        prop_assert_eq!(version.get(), n);
        prop_assert_eq!(version.to_string(), n.to_string());
    }
}
