//! Racing passes, conflicts, and terminal-status protection

use crate::prelude::*;
use sluice_core::{CasOutcome, CompositeStatus, JobStatus, StatusWriter};
use sluice_engine::{CoordinatorConfig, ProcessingCoordinator};
use sluice_storage::FaultStore;

#[tokio::test]
async fn a_losing_pass_retries_and_converges() {
    let (store, _, pipeline) = three_stage_pipeline();
    let faulty = FaultStore::new(store.clone());
    let coordinator = ProcessingCoordinator::new(faulty.clone());

    // a sibling worker commits between this pass's read and its write
    faulty.fail_next_writes(1);
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Success, 0))
        .await;
    assert_eq!(result, Ok(ok_result(1)));

    assert_eq!(
        coordinator.current_stage_status(&pipeline, 0).await,
        Ok(CompositeStatus::Success)
    );
    assert_eq!(job_status(&store, &pipeline, "j-test").await, "pending");
}

#[tokio::test]
async fn forced_conflict_run_reports_exact_retry_count() {
    let (store, _, pipeline) = three_stage_pipeline();
    let faulty = FaultStore::new(store);
    let coordinator = ProcessingCoordinator::with_config(
        faulty.clone(),
        CoordinatorConfig::new().with_max_attempts(10),
    );

    faulty.fail_next_writes(4);
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Running, 0))
        .await;
    assert_eq!(result, Ok(ok_result(4)));
}

#[tokio::test]
async fn two_sibling_completions_both_land() {
    let (store, coordinator, pipeline) = three_stage_pipeline();
    let _ = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Success, 0))
        .await;

    // both stage-1 jobs finish back to back; each triggers its own pass
    let version = store.job_lock_version(&pipeline, &jid("j-test")).unwrap();
    let first = coordinator
        .process(&pipeline, trigger("j-test", JobStatus::Success, version))
        .await;
    let version = store.job_lock_version(&pipeline, &jid("j-lint")).unwrap();
    let second = coordinator
        .process(&pipeline, trigger("j-lint", JobStatus::Success, version))
        .await;
    assert_eq!(first, Ok(ok_result(0)));
    assert_eq!(second, Ok(ok_result(0)));

    assert_eq!(
        coordinator.current_stage_status(&pipeline, 1).await,
        Ok(CompositeStatus::Success)
    );
    assert_eq!(job_status(&store, &pipeline, "j-deploy").await, "pending");
}

#[tokio::test]
async fn cancellation_wins_against_an_in_flight_pass() {
    let (store, coordinator, pipeline) = three_stage_pipeline();

    // cancellation lands first; the racing trigger must not resurrect
    // the pipeline into `running`
    store.cancel_pipeline(&pipeline).unwrap();
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Running, 0))
        .await;
    assert_eq!(result, Ok(ok_result(0)));

    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::Canceled)
    );
}

#[tokio::test]
async fn a_direct_stale_write_is_rejected_by_the_store() {
    let (store, coordinator, pipeline) = three_stage_pipeline();
    let _ = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Failed, 0))
        .await;

    // pass A read pipeline version 0 before pass B concluded `failed`;
    // its stale commit must lose rather than regress the terminal status
    let outcome = store
        .compare_and_swap_pipeline_status(&pipeline, CompositeStatus::Running, 0)
        .await;
    assert_eq!(outcome, Ok(CasOutcome::Conflict));
    assert_eq!(
        coordinator.current_status(&pipeline).await,
        Ok(CompositeStatus::Failed)
    );
}

#[tokio::test]
async fn stale_trigger_version_surfaces_as_conflict_after_retries() {
    let (store, _, pipeline) = three_stage_pipeline();
    let coordinator = ProcessingCoordinator::with_config(
        store.clone(),
        CoordinatorConfig::new().with_max_attempts(3),
    );

    // another writer already advanced the job; this trigger's version
    // can never match and the caller is told to re-trigger later
    let _ = store
        .compare_and_swap_job_status(&pipeline, &jid("j-build"), JobStatus::Running, 0)
        .await;
    let result = coordinator
        .process(&pipeline, trigger("j-build", JobStatus::Failed, 0))
        .await;
    assert_eq!(
        result.map(|r| (r.succeeded, r.conflict)),
        Ok((false, true))
    );
}
