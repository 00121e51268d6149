//! engine
//!
//! Compiles the scanned tree into a plan and drives the plan to completion.
//!
//! # Architecture
//!
//! Every build follows the same lifecycle:
//!
//! ```text
//! Scan -> Compile -> [Lock] -> Snapshot -> Process
//! ```
//!
//! 1. **Scan**: walk the project directory into an inheritance tree
//!    ([`crate::core::scan`])
//! 2. **Compile**: derive the ordered build plan ([`plan`])
//! 3. **Lock**: take the project build lock ([`crate::core::lock`])
//! 4. **Snapshot**: query the image registry
//! 5. **Process**: build each step whose source image exists
//!    ([`orchestrator`])
//!
//! # Invariants
//!
//! - Compilation is pure; only the orchestrator talks to external systems
//! - The orchestrator is the only component that invokes the builder
//! - A malformed tree aborts the run before any plan exists

pub mod orchestrator;
pub mod plan;

use std::path::{Path, PathBuf};

use crate::core::naming::NamingConvention;
use crate::core::scan::{scan_tree, ScanError};
use crate::core::tree::InheritanceTree;

pub use orchestrator::{
    BuildError, BuildMode, BuildOrchestrator, BuildReport, FailurePolicy, OrchestratorError,
    OrchestratorOptions, StepOutcome, StepResult,
};
pub use plan::{compile, BuildPlan, BuildStep, CompileError};

/// Execution context shared by all commands.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Project directory override (defaults to the current directory).
    pub cwd: Option<PathBuf>,
    /// Enable debug output.
    pub debug: bool,
    /// Minimal output.
    pub quiet: bool,
}

impl Context {
    /// The project directory commands operate on.
    pub fn project_dir(&self) -> std::io::Result<PathBuf> {
        match &self.cwd {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

/// Errors from loading a plan from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadPlanError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Scan the project directory and compile its build plan.
pub fn load_plan(
    project_dir: &Path,
    naming: &NamingConvention,
) -> Result<(InheritanceTree, BuildPlan), LoadPlanError> {
    let tree = scan_tree(project_dir, naming)?;
    let plan = compile(&tree, naming)?;
    Ok((tree, plan))
}
