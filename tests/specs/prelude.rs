//! Shared helpers for behavioral specs

use sluice_core::{JobId, JobStatus, PipelineId};
use sluice_engine::{ProcessingCoordinator, ProcessingResult, Trigger};
use sluice_storage::{JobSeed, MemoryStore};

pub fn pid(s: &str) -> PipelineId {
    PipelineId::from(s)
}

pub fn jid(s: &str) -> JobId {
    JobId::from(s)
}

pub fn trigger(job: &str, status: JobStatus, version: u64) -> Trigger {
    Trigger::new(job, status, version)
}

pub fn ok_result(retries: u32) -> ProcessingResult {
    ProcessingResult {
        succeeded: true,
        conflict: false,
        retries_used: retries,
    }
}

/// A three-stage pipeline: build | {test, lint (allowed to fail)} | deploy
pub fn three_stage_pipeline() -> (MemoryStore, ProcessingCoordinator<MemoryStore>, PipelineId) {
    let store = MemoryStore::new();
    let pipeline = pid("p-spec");
    store.create_pipeline(&pipeline);
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-build", "build", 0).with_status(JobStatus::Pending),
    );
    let _ = store.insert_job(&pipeline, JobSeed::new("j-test", "test", 1));
    let _ = store.insert_job(
        &pipeline,
        JobSeed::new("j-lint", "lint", 1).with_allow_failure(),
    );
    let _ = store.insert_job(&pipeline, JobSeed::new("j-deploy", "deploy", 2));
    let coordinator = ProcessingCoordinator::new(store.clone());
    (store, coordinator, pipeline)
}

/// Current persisted status string of one job
pub async fn job_status(store: &MemoryStore, pipeline: &PipelineId, id: &str) -> String {
    store
        .job_row(pipeline, &jid(id))
        .map(|row| row.status)
        .unwrap_or_else(|e| panic!("job {id} missing: {e}"))
}
