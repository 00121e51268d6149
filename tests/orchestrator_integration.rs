//! End-to-end tests: directory tree -> plan -> orchestrated builds.
//!
//! These tests scan real directory fixtures and drive the orchestrator with
//! the mock builder and registry.

use assert_fs::prelude::*;
use assert_fs::TempDir;

use amitree::builder::mock::MockBuilder;
use amitree::core::naming::NamingConvention;
use amitree::engine::{
    self, BuildMode, BuildOrchestrator, FailurePolicy, OrchestratorOptions, StepOutcome,
};
use amitree::registry::mock::MockRegistry;
use amitree::registry::RegistryError;

/// ami
/// ├── base (1, 2)
/// │   ├── web (1)
/// │   │   └── api (5)
/// │   └── worker (3)
/// └── minimal (1)
///     └── tiny (1)
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in [
        "ami/base/provisioners/1.sh",
        "ami/base/provisioners/2.sh",
        "ami/base/web/provisioners/1.sh",
        "ami/base/web/api/provisioners/5.sh",
        "ami/base/worker/provisioners/3.sh",
        "ami/minimal/provisioners/1.sh",
        "ami/minimal/tiny/provisioners/1.sh",
        "ami/.DS_Store",
        "ami/base/provisioners/.DS_Store",
    ] {
        dir.child(file).write_str("").unwrap();
    }
    dir
}

fn base_images() -> MockRegistry {
    MockRegistry::with_images([("base-2_ami", "ami-base"), ("minimal-1_ami", "ami-min")])
}

#[tokio::test]
async fn builds_whole_tree_from_base_images() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();
    assert_eq!(
        plan.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec![
            "web-1_base-2_ami",
            "api-5_web-1_base-2_ami",
            "worker-3_base-2_ami",
            "tiny-1_minimal-1_ami",
        ]
    );

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone());
    let mut orchestrator =
        BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
            .await
            .unwrap();
    let report = orchestrator.process(&plan).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.built_count(), 4);
    assert_eq!(
        builder.built_targets(),
        plan.iter().map(|s| s.name.clone()).collect::<Vec<_>>()
    );

    // api was built from the image web produced moments earlier.
    let requests = builder.requests();
    let web_id = registry.images().get("web-1_base-2_ami").cloned().unwrap();
    assert_eq!(requests[1].source_image, web_id);
    assert_eq!(
        requests[1].provisioner_path,
        "ami/base/web/api/provisioners/5.sh"
    );
}

#[tokio::test]
async fn second_run_builds_nothing() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone());

    let mut first = BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
        .await
        .unwrap();
    first.process(&plan).await.unwrap();
    builder.clear_requests();

    let mut second =
        BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
            .await
            .unwrap();
    let report = second.process(&plan).await.unwrap();

    assert_eq!(builder.build_count(), 0);
    assert_eq!(report.already_built_count(), 4);
}

#[tokio::test]
async fn missing_base_leaves_subtree_unbuilt() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    // Only the old base version exists; the plan wants base-2.
    let registry = MockRegistry::with_images([("base-1_ami", "ami-old"), ("minimal-1_ami", "ami-min")]);
    let builder = MockBuilder::registering_into(registry.clone());
    let mut orchestrator =
        BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
            .await
            .unwrap();
    let report = orchestrator.process(&plan).await.unwrap();

    assert_eq!(builder.built_targets(), vec!["tiny-1_minimal-1_ami"]);
    assert_eq!(report.unsatisfied_count(), 3);
    assert!(report.is_success());

    let missing: Vec<String> = report
        .errors()
        .iter()
        .map(|e| e.to_string())
        .collect();
    assert_eq!(missing.len(), 3);
    assert!(missing[0].contains("base-2_ami"));
}

#[tokio::test]
async fn halt_stops_after_first_failure() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone()).fail_on("worker-3_base-2_ami");
    let mut orchestrator =
        BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
            .await
            .unwrap();
    let report = orchestrator.process(&plan).await.unwrap();

    assert!(report.halted);
    assert!(!report.is_success());
    assert_eq!(report.built_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.results[3].outcome, StepOutcome::NotAttempted);
}

#[tokio::test]
async fn fixed_point_with_continue_recovers_what_it_can() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone()).fail_on("web-1_base-2_ami");
    let options = OrchestratorOptions {
        mode: BuildMode::FixedPoint,
        on_failure: FailurePolicy::Continue,
        dry_run: false,
    };
    let mut orchestrator = BuildOrchestrator::connect(&builder, &registry, options)
        .await
        .unwrap();
    let report = orchestrator.process(&plan).await.unwrap();

    assert!(!report.halted);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.built_count(), 2);
    assert!(matches!(
        report.results[1].outcome,
        StepOutcome::Unsatisfied { .. }
    ));
    // The failed web step is not retried in later passes.
    assert_eq!(
        builder
            .built_targets()
            .iter()
            .filter(|t| t.as_str() == "web-1_base-2_ami")
            .count(),
        1
    );
}

#[tokio::test]
async fn dry_run_invokes_nothing() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone());
    let options = OrchestratorOptions {
        dry_run: true,
        ..Default::default()
    };
    let mut orchestrator = BuildOrchestrator::connect(&builder, &registry, options)
        .await
        .unwrap();
    let report = orchestrator.process(&plan).await.unwrap();

    assert_eq!(builder.build_count(), 0);
    assert_eq!(report.would_build_count(), 4);
    assert_eq!(registry.images().len(), 2);
}

#[tokio::test]
async fn registry_failure_aborts() {
    let dir = fixture();
    let (_, plan) = engine::load_plan(dir.path(), &NamingConvention::default()).unwrap();

    let registry = base_images();
    let builder = MockBuilder::registering_into(registry.clone());
    let mut orchestrator =
        BuildOrchestrator::connect(&builder, &registry, OrchestratorOptions::default())
            .await
            .unwrap();

    // Clones share state: every later fetch fails.
    let _ = registry
        .clone()
        .fail_with(RegistryError::Parse("truncated output".into()));
    let result = orchestrator.process(&plan).await;

    assert!(result.is_err());
    assert_eq!(builder.build_count(), 1);
}
