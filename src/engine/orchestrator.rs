//! engine::orchestrator
//!
//! The single, sequential build orchestrator.
//!
//! # Architecture
//!
//! The orchestrator owns the registry snapshot and is the only component
//! that invokes the image builder. It walks the plan in order:
//!
//! 1. If the step's image is already in the snapshot, it is skipped
//! 2. If the step's source image is in the snapshot, the builder runs and
//!    the snapshot is refreshed (replaced wholesale) before moving on
//! 3. Otherwise the step is left unbuilt and reported as unsatisfied
//!
//! # Modes
//!
//! - [`BuildMode::SinglePass`]: one forward pass. Correctness relies on the
//!   plan's preorder: every producer precedes its dependents.
//! - [`BuildMode::FixedPoint`]: repeat passes over the remaining steps until
//!   a pass builds nothing.
//!
//! # Invariants
//!
//! - Exactly one build runs at a time; the snapshot is refreshed after each
//!   successful build and before the next step is considered
//! - A registry query failure aborts the run
//! - Builder failures are never silent: they are recorded with the step
//!   name and either halt the run or let it continue, per [`FailurePolicy`]
//!
//! # Example
//!
//! ```
//! use amitree::builder::mock::MockBuilder;
//! use amitree::engine::orchestrator::{BuildOrchestrator, OrchestratorOptions};
//! use amitree::engine::plan::{BuildPlan, BuildStep};
//! use amitree::registry::mock::MockRegistry;
//!
//! # tokio_test::block_on(async {
//! let registry = MockRegistry::with_images([("base-2_ami", "ami-base")]);
//! let builder = MockBuilder::registering_into(registry.clone());
//! let plan = BuildPlan::new(vec![BuildStep {
//!     name: "web-1_base-2_ami".into(),
//!     source_name: "base-2_ami".into(),
//!     provisioner_path: "ami/base/web/provisioners/1.sh".into(),
//! }]);
//!
//! let mut orchestrator =
//!     BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
//!         .await
//!         .unwrap();
//! let report = orchestrator.process(&plan).await.unwrap();
//! assert_eq!(report.built_count(), 1);
//! assert!(orchestrator.snapshot().contains("web-1_base-2_ami"));
//! # });
//! ```

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::plan::{BuildPlan, BuildStep};
use crate::builder::{BuildRequest, BuilderError, ImageBuilder};
use crate::core::types::ImageId;
use crate::registry::{ImageRegistry, ImageRegistryClient, RegistryError};

/// How the orchestrator walks the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// One forward pass; steps whose source is missing are left unbuilt.
    #[default]
    SinglePass,
    /// Repeat passes until no further step can be built.
    FixedPoint,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::SinglePass => write!(f, "single-pass"),
            BuildMode::FixedPoint => write!(f, "fixed-point"),
        }
    }
}

/// What to do after a build fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run; remaining steps are not attempted.
    #[default]
    Halt,
    /// Record the failure and carry on with the next step.
    Continue,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Halt => write!(f, "halt"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Orchestrator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrchestratorOptions {
    pub mode: BuildMode,
    pub on_failure: FailurePolicy,
    /// Report what would be built without invoking the builder.
    pub dry_run: bool,
}

/// Per-step diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The step's source image was not in the registry when it was reached.
    #[error("cannot build {step}: source image {source_name} is not registered")]
    MissingSource { step: String, source_name: String },

    /// The builder failed.
    #[error("failed to build {step}: {source}")]
    BuilderFailed {
        step: String,
        #[source]
        source: BuilderError,
    },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("registry query failed: {0}")]
    Registry(#[from] RegistryError),
}

/// The outcome of one plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The image was already in the registry.
    AlreadyBuilt { image_id: ImageId },
    /// The image was built. `image_id` is `None` if the refreshed registry
    /// did not (yet) list it.
    Built { image_id: Option<ImageId> },
    /// Dry run: the image would have been built.
    WouldBuild,
    /// The source image never became available.
    Unsatisfied {
        /// Same as the step's source; not repeated in JSON.
        #[serde(skip)]
        source_name: String,
    },
    /// The builder failed.
    Failed { error: BuilderError },
    /// The run halted before reaching this step.
    NotAttempted,
}

/// A step together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    #[serde(flatten)]
    pub step: BuildStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Result of processing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: BuildMode,
    pub dry_run: bool,
    /// Number of passes made over the plan.
    pub passes: usize,
    /// Whether a failure stopped the run early.
    pub halted: bool,
    /// One result per plan step, in plan order.
    pub results: Vec<StepResult>,
}

impl BuildReport {
    fn count(&self, predicate: impl Fn(&StepOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }

    /// Number of images built in this run.
    pub fn built_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Built { .. }))
    }

    /// Number of images that were already present.
    pub fn already_built_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::AlreadyBuilt { .. }))
    }

    /// Number of images a dry run would build.
    pub fn would_build_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::WouldBuild))
    }

    /// Number of failed builds.
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    /// Number of steps whose source image never appeared.
    pub fn unsatisfied_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Unsatisfied { .. }))
    }

    /// Number of steps skipped because the run halted.
    pub fn not_attempted_count(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::NotAttempted))
    }

    /// Whether every attempted build succeeded.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Diagnostics for every failed or unsatisfied step, in plan order.
    pub fn errors(&self) -> Vec<BuildError> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                StepOutcome::Unsatisfied { source_name } => Some(BuildError::MissingSource {
                    step: r.step.name.clone(),
                    source_name: source_name.clone(),
                }),
                StepOutcome::Failed { error } => Some(BuildError::BuilderFailed {
                    step: r.step.name.clone(),
                    source: error.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// One-line summary of the run.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.dry_run {
            parts.push(format!("{} would build", self.would_build_count()));
        } else {
            parts.push(format!("{} built", self.built_count()));
        }
        parts.push(format!("{} already present", self.already_built_count()));
        parts.push(format!("{} failed", self.failed_count()));
        parts.push(format!("{} unsatisfied", self.unsatisfied_count()));
        if self.halted {
            parts.push(format!("{} not attempted", self.not_attempted_count()));
        }
        parts.join(", ")
    }
}

/// Drives the image builder through a plan.
pub struct BuildOrchestrator<'a> {
    builder: &'a dyn ImageBuilder,
    registry: &'a dyn ImageRegistryClient,
    snapshot: ImageRegistry,
    options: OrchestratorOptions,
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator with an empty snapshot.
    ///
    /// Call [`refresh_registry`](Self::refresh_registry) before processing,
    /// or use [`connect`](Self::connect).
    pub fn new(
        builder: &'a dyn ImageBuilder,
        registry: &'a dyn ImageRegistryClient,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            builder,
            registry,
            snapshot: ImageRegistry::new(),
            options,
        }
    }

    /// Create an orchestrator and take the initial registry snapshot.
    pub async fn connect(
        builder: &'a dyn ImageBuilder,
        registry: &'a dyn ImageRegistryClient,
        options: OrchestratorOptions,
    ) -> Result<Self, OrchestratorError> {
        let mut orchestrator = Self::new(builder, registry, options);
        orchestrator.refresh_registry().await?;
        Ok(orchestrator)
    }

    /// The current registry snapshot.
    pub fn snapshot(&self) -> &ImageRegistry {
        &self.snapshot
    }

    /// Re-query the registry and replace the snapshot.
    pub async fn refresh_registry(&mut self) -> Result<(), OrchestratorError> {
        self.snapshot = self.registry.fetch_images().await?;
        debug!(
            registry = self.registry.name(),
            images = self.snapshot.len(),
            "registry snapshot refreshed"
        );
        Ok(())
    }

    /// Process a plan.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Registry` if a registry refresh fails.
    /// Builder failures are reported in the returned [`BuildReport`].
    pub async fn process(&mut self, plan: &BuildPlan) -> Result<BuildReport, OrchestratorError> {
        let started_at = Utc::now();
        let mut outcomes: Vec<Option<StepOutcome>> = vec![None; plan.len()];
        // Dry runs track would-be images here instead of in the snapshot.
        let mut simulated: BTreeSet<String> = BTreeSet::new();
        let mut passes = 0;
        let mut halted = false;

        loop {
            passes += 1;
            let mut progressed = false;

            for (index, step) in plan.iter().enumerate() {
                if outcomes[index].is_some() {
                    continue;
                }

                if let Some(image_id) = self.snapshot.get(&step.name) {
                    debug!(image = %step.name, id = %image_id, "already built");
                    outcomes[index] = Some(StepOutcome::AlreadyBuilt {
                        image_id: image_id.clone(),
                    });
                    continue;
                }

                let source_available = self.snapshot.contains(&step.source_name)
                    || simulated.contains(&step.source_name);
                if !source_available {
                    if self.options.mode == BuildMode::SinglePass {
                        outcomes[index] = Some(StepOutcome::Unsatisfied {
                            source_name: step.source_name.clone(),
                        });
                    }
                    continue;
                }

                if self.options.dry_run {
                    info!(image = %step.name, source = %step.source_name, "would build");
                    simulated.insert(step.name.clone());
                    outcomes[index] = Some(StepOutcome::WouldBuild);
                    progressed = true;
                    continue;
                }

                let outcome = self.build_step(step).await?;
                let failed = matches!(outcome, StepOutcome::Failed { .. });
                outcomes[index] = Some(outcome);
                if failed {
                    if self.options.on_failure == FailurePolicy::Halt {
                        halted = true;
                        break;
                    }
                } else {
                    progressed = true;
                }
            }

            if halted || self.options.mode == BuildMode::SinglePass || !progressed {
                break;
            }
        }

        let results: Vec<StepResult> = plan
            .iter()
            .zip(outcomes)
            .map(|(step, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    if halted {
                        StepOutcome::NotAttempted
                    } else {
                        StepOutcome::Unsatisfied {
                            source_name: step.source_name.clone(),
                        }
                    }
                });
                StepResult {
                    step: step.clone(),
                    outcome,
                }
            })
            .collect();

        for result in &results {
            if let StepOutcome::Unsatisfied { source_name } = &result.outcome {
                warn!(
                    image = %result.step.name,
                    source = %source_name,
                    "source image not registered; step left unbuilt"
                );
            }
        }

        Ok(BuildReport {
            started_at,
            finished_at: Utc::now(),
            mode: self.options.mode,
            dry_run: self.options.dry_run,
            passes,
            halted,
            results,
        })
    }

    /// Build one step whose source is known to be in the snapshot.
    async fn build_step(&mut self, step: &BuildStep) -> Result<StepOutcome, OrchestratorError> {
        let Some(source_image) = self.snapshot.get(&step.source_name).cloned() else {
            return Ok(StepOutcome::Unsatisfied {
                source_name: step.source_name.clone(),
            });
        };

        info!(
            image = %step.name,
            source = %step.source_name,
            source_id = %source_image,
            provisioner = %step.provisioner_path,
            "building image"
        );
        let request = BuildRequest {
            target_name: step.name.clone(),
            source_image,
            provisioner_path: step.provisioner_path.clone(),
        };

        match self.builder.build(&request).await {
            Ok(()) => {
                self.refresh_registry().await?;
                let image_id = self.snapshot.get(&step.name).cloned();
                if image_id.is_none() {
                    warn!(image = %step.name, "build succeeded but image is not registered yet");
                }
                Ok(StepOutcome::Built { image_id })
            }
            Err(error) => {
                warn!(image = %step.name, %error, "build failed");
                Ok(StepOutcome::Failed { error })
            }
        }
    }
}
