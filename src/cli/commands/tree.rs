//! tree command - Print the scanned inheritance tree

use crate::core::scan::scan_tree;
use crate::engine::Context;
use anyhow::{Context as _, Result};

/// Print the inheritance tree as pretty JSON.
pub fn tree(ctx: &Context) -> Result<()> {
    let (project_dir, config) = super::load_project(ctx)?;
    let naming = config.naming();

    let tree = scan_tree(&project_dir, &naming)
        .with_context(|| format!("Failed to scan {}", project_dir.display()))?;

    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}
