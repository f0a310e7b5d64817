//! End-to-end pipeline progression through triggered processing passes

use crate::prelude::*;
use sluice_core::{CompositeStatus, JobStatus, JobStore};
use sluice_engine::ProcessingCoordinator;
use sluice_storage::{JobSeed, MemoryStore};

#[tokio::test]
async fn a_pipeline_walks_its_stages_to_success() {
    let (store, coordinator, pipeline) = three_stage_pipeline();

    // build starts
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Running, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::Running)
    );

    // build succeeds: stage 1 is released, stage 2 stays gated
    let version = store.job_lock_version(&pipeline, &jid("j-build")).unwrap();
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Success, version))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(job_status(&store, &pipeline, "j-test").await, "pending");
    assert_eq!(job_status(&store, &pipeline, "j-lint").await, "pending");
    assert_eq!(job_status(&store, &pipeline, "j-deploy").await, "created");

    // test passes, lint fails but is allowed to: stage 2 is released
    let version = store.job_lock_version(&pipeline, &jid("j-test")).unwrap();
    let _ = coordinator
        .process(&pipeline, trigger("j-test", JobStatus::Success, version))
        .await;
    let version = store.job_lock_version(&pipeline, &jid("j-lint")).unwrap();
    let result = coordinator
        .process(&pipeline, trigger("j-lint", JobStatus::Failed, version))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(job_status(&store, &pipeline, "j-deploy").await, "pending");
    assert_eq!(
        coordinator.current_stage_status(&pipeline, 1).await,
        Ok(CompositeStatus::SuccessWithWarnings)
    );

    // deploy runs and succeeds: the warning survives in the final composite
    let version = store.job_lock_version(&pipeline, &jid("j-deploy")).unwrap();
    let result = coordinator
        .process(&pipeline, trigger("j-deploy", JobStatus::Success, version))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::SuccessWithWarnings)
    );
}

#[tokio::test]
async fn a_failed_stage_stops_the_pipeline() {
    let (store, coordinator, pipeline) = three_stage_pipeline();

    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Failed, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));

    assert_eq!(job_status(&store, &pipeline, "j-test").await, "skipped");
    assert_eq!(job_status(&store, &pipeline, "j-lint").await, "skipped");
    assert_eq!(job_status(&store, &pipeline, "j-deploy").await, "skipped");
    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::Failed)
    );

    // the store still answers reads after the pipeline concluded
    let rows = store.list_current_jobs(&pipeline).await.unwrap();
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn dag_edges_release_independently_of_stage_order() {
    let store = MemoryStore::new();
    let pipeline = pid("p-dag");
    store.create_pipeline(&pipeline);
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-compile", "compile", 0).with_status(JobStatus::Running),
    );
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-docs", "docs", 0).with_status(JobStatus::Running),
    );
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-unit", "unit", 1).with_needs(["compile"]),
    );
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-site", "site", 1).with_needs(["docs"]),
    );
    let coordinator = ProcessingCoordinator::new(store.clone());

    // compile finishing releases unit, while site keeps waiting for docs
    let result = coordinator
        .process(&pipeline, trigger("j-compile", JobStatus::Success, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(job_status(&store, &pipeline, "j-unit").await, "pending");
    assert_eq!(job_status(&store, &pipeline, "j-site").await, "created");

    // docs failing skips only its dependent
    let result = coordinator
        .process(&pipeline, trigger("j-docs", JobStatus::Failed, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(job_status(&store, &pipeline, "j-site").await, "skipped");
    assert_eq!(job_status(&store, &pipeline, "j-unit").await, "pending");
    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::Failed)
    );
}

#[tokio::test]
async fn a_retried_job_is_the_only_attempt_a_pass_sees() {
    let (store, coordinator, pipeline) = three_stage_pipeline();

    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Failed, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));

    // operator retries the build with a fresh row reusing the name; the
    // superseded attempt is invisible, so the name is not a duplicate
    let _ = store.retry_job(
        &pipeline,
        &jid("j-build"),
        JobSeed::new("j-build-2", "build", 0).with_status(JobStatus::Pending),
    );
    let result = coordinator
        .process(&pipeline, trigger("j-build-2", JobStatus::Running, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));
    assert_eq!(job_status(&store, &pipeline, "j-build-2").await, "running");

    // committed stage/pipeline statuses are terminal and stay that way;
    // reopening a concluded attempt is an explicit reset, not a recompute
    assert_eq!(
        coordinator.current_stage_status(&pipeline, 0).await,
        Ok(CompositeStatus::Failed)
    );
}
