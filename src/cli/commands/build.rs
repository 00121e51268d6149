//! cli::commands::build
//!
//! Build every image whose source image is registered.
//!
//! # Design
//!
//! The build command:
//! - Compiles the plan from the project tree
//! - Holds the project lock for the whole run (not for dry runs)
//! - Drives packer through the plan, refreshing the registry after each build
//! - Exits non-zero when any build failed
//!
//! # Example
//!
//! ```bash
//! amitree build
//! amitree build --dry-run
//! amitree build --mode fixed-point --on-failure continue
//! ```

use std::path::Path;

use crate::builder::ImageBuilder;
use crate::core::config::Config;
use crate::core::lock::BuildLock;
use crate::engine::{
    self, BuildMode, BuildOrchestrator, BuildPlan, BuildReport, Context, FailurePolicy,
    OrchestratorOptions, StepOutcome,
};
use crate::registry::ImageRegistryClient;
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};

/// Command-line overrides for a build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildArgs {
    pub dry_run: bool,
    pub mode: Option<BuildMode>,
    pub on_failure: Option<FailurePolicy>,
    pub json: bool,
}

/// Run the build command.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn build(ctx: &Context, args: BuildArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(build_async(ctx, args))
}

/// Async implementation of build.
async fn build_async(ctx: &Context, args: BuildArgs) -> Result<()> {
    let (project_dir, config) = super::load_project(ctx)?;
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let (_, plan) = engine::load_plan(&project_dir, &config.naming())
        .with_context(|| format!("Failed to compile plan for {}", project_dir.display()))?;

    let options = resolve_options(&config, args);

    if plan.is_empty() {
        output::print("Nothing to build.", verbosity);
        return Ok(());
    }

    // Dry runs never invoke the builder, so they don't need the lock.
    let _lock = if options.dry_run {
        None
    } else {
        Some(BuildLock::acquire(&project_dir).context("Failed to lock project")?)
    };

    let builder = super::packer_builder(&config, &project_dir);
    let registry = super::registry_client(&config);

    let report = run_plan(&builder, &registry, &plan, options, &project_dir).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, verbosity);
    }

    if !report.is_success() {
        bail!(
            "{} of {} build(s) failed",
            report.failed_count(),
            report.results.len()
        );
    }
    Ok(())
}

/// Merge command-line overrides over configured defaults.
fn resolve_options(config: &Config, args: BuildArgs) -> OrchestratorOptions {
    OrchestratorOptions {
        mode: args.mode.unwrap_or_else(|| config.build_mode()),
        on_failure: args.on_failure.unwrap_or_else(|| config.failure_policy()),
        dry_run: args.dry_run,
    }
}

/// Snapshot the registry and process the plan.
async fn run_plan(
    builder: &dyn ImageBuilder,
    registry: &dyn ImageRegistryClient,
    plan: &BuildPlan,
    options: OrchestratorOptions,
    project_dir: &Path,
) -> Result<BuildReport> {
    tracing::info!(
        project = %project_dir.display(),
        steps = plan.len(),
        digest = %plan.digest(),
        mode = %options.mode,
        dry_run = options.dry_run,
        "starting build run"
    );

    let mut orchestrator = BuildOrchestrator::connect(builder, registry, options)
        .await
        .context("Failed to query image registry")?;

    orchestrator
        .process(plan)
        .await
        .context("Build run aborted")
}

fn print_report(report: &BuildReport, verbosity: Verbosity) {
    for result in &report.results {
        let name = &result.step.name;
        match &result.outcome {
            StepOutcome::AlreadyBuilt { image_id } => {
                output::debug(format!("{} already present ({})", name, image_id), verbosity)
            }
            StepOutcome::Built { image_id: Some(id) } => {
                output::success(format!("built {} ({})", name, id), verbosity)
            }
            StepOutcome::Built { image_id: None } => output::warn(
                format!("built {} but it is not registered yet", name),
                verbosity,
            ),
            StepOutcome::WouldBuild => output::print(
                format!(
                    "would build {} from {}",
                    name, result.step.source_name
                ),
                verbosity,
            ),
            StepOutcome::Unsatisfied { source_name } => output::warn(
                format!("skipped {}: source image {} not found", name, source_name),
                verbosity,
            ),
            StepOutcome::Failed { error } => output::error(error),
            StepOutcome::NotAttempted => {
                output::debug(format!("{} not attempted", name), verbosity)
            }
        }
    }
    output::print(report.summary(), verbosity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::mock::MockBuilder;
    use crate::core::config::{BuildDefaults, GlobalConfig};
    use crate::engine::BuildStep;
    use crate::registry::mock::MockRegistry;

    #[test]
    fn flags_override_config() {
        let config = Config::new(
            GlobalConfig {
                build: Some(BuildDefaults {
                    mode: Some(BuildMode::FixedPoint),
                    on_failure: Some(FailurePolicy::Continue),
                }),
                ..Default::default()
            },
            None,
        );

        let options = resolve_options(&config, BuildArgs::default());
        assert_eq!(options.mode, BuildMode::FixedPoint);
        assert_eq!(options.on_failure, FailurePolicy::Continue);

        let options = resolve_options(
            &config,
            BuildArgs {
                mode: Some(BuildMode::SinglePass),
                dry_run: true,
                ..Default::default()
            },
        );
        assert_eq!(options.mode, BuildMode::SinglePass);
        assert_eq!(options.on_failure, FailurePolicy::Continue);
        assert!(options.dry_run);
    }

    #[tokio::test]
    async fn run_plan_uses_injected_capabilities() {
        let registry = MockRegistry::with_images([("base-1_ami", "ami-base")]);
        let builder = MockBuilder::registering_into(registry.clone());
        let plan = BuildPlan::new(vec![BuildStep {
            name: "web-1_base-1_ami".to_string(),
            source_name: "base-1_ami".to_string(),
            provisioner_path: "ami/base/web/provisioners/1.sh".to_string(),
        }]);

        let report = run_plan(
            &builder,
            &registry,
            &plan,
            OrchestratorOptions::default(),
            Path::new("."),
        )
        .await
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.built_count(), 1);
        assert_eq!(builder.built_targets(), vec!["web-1_base-1_ami"]);
    }
}
