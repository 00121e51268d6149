//! cli::commands::plan
//!
//! Show the ordered build plan.
//!
//! # Example
//!
//! ```bash
//! amitree plan
//! amitree plan --json
//! ```

use serde::Serialize;

use crate::engine::{self, BuildStep, Context};
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

#[derive(Serialize)]
struct PlanJson<'a> {
    digest: String,
    steps: &'a [BuildStep],
}

/// Run the plan command.
pub fn plan(ctx: &Context, json: bool) -> Result<()> {
    let (project_dir, config) = super::load_project(ctx)?;
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let (_, plan) = engine::load_plan(&project_dir, &config.naming())
        .with_context(|| format!("Failed to compile plan for {}", project_dir.display()))?;

    if json {
        let doc = PlanJson {
            digest: plan.digest(),
            steps: plan.steps(),
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    output::print(plan.preview(), verbosity);
    if !plan.is_empty() {
        let externals = plan.external_sources();
        output::print(
            format!(
                "external base images: {}",
                externals.into_iter().collect::<Vec<_>>().join(", ")
            ),
            verbosity,
        );
    }
    output::debug(format!("plan digest: {}", plan.digest()), verbosity);
    Ok(())
}
