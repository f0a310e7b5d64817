// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic processing coordinator
//!
//! One `process` call handles one trigger ("job X now has status Y"): it
//! builds a fresh snapshot, folds the trigger in, releases downstream jobs
//! whose gates opened, and commits recomputed stage/pipeline composites
//! with compare-and-swap writes. A version conflict anywhere discards the
//! snapshot and retries the whole pass, up to a bounded attempt count.

use crate::config::CoordinatorConfig;
use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use sluice_core::{
    CasOutcome, CompositeStatus, JobId, JobSnapshot, JobStatus, JobStore, PipelineId,
    SnapshotError, StatusWriter, StoreError,
};
use std::collections::{BTreeSet, HashSet};
use tokio::time::sleep;

/// An external status transition to fold into the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub job_id: JobId,
    pub new_status: JobStatus,
    pub expected_lock_version: u64,
}

impl Trigger {
    pub fn new(job_id: impl Into<JobId>, new_status: JobStatus, expected_lock_version: u64) -> Self {
        Self {
            job_id: job_id.into(),
            new_status,
            expected_lock_version,
        }
    }
}

/// Outcome of one `process` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub succeeded: bool,
    /// Retries were exhausted by version conflicts; re-trigger later
    pub conflict: bool,
    pub retries_used: u32,
}

/// How one pass ended
enum PassOutcome {
    Committed,
    /// A compare-and-swap lost; reload and retry the whole pass
    Conflict,
    /// Pipeline has no current jobs: trivially successful, nothing to write
    Empty,
    /// Referenced job is gone; log and drop, do not retry
    Dropped,
}

/// Orchestrates processing passes against a store
#[derive(Debug, Clone)]
pub struct ProcessingCoordinator<S> {
    store: S,
    config: CoordinatorConfig,
}

impl<S> ProcessingCoordinator<S>
where
    S: JobStore + StatusWriter,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self { store, config }
    }

    /// Process one trigger, retrying bounded-many times on conflicts.
    ///
    /// Conflict exhaustion and dropped passes are reported in the result,
    /// not as errors; only malformed data and exhausted store failures
    /// surface as `Err`.
    pub async fn process(
        &self,
        pipeline_id: &PipelineId,
        trigger: Trigger,
    ) -> Result<ProcessingResult, ProcessError> {
        let mut retries = 0u32;
        let mut io_failures = 0u32;

        loop {
            match self.attempt(pipeline_id, &trigger).await {
                Ok(PassOutcome::Committed) | Ok(PassOutcome::Empty) => {
                    return Ok(ProcessingResult {
                        succeeded: true,
                        conflict: false,
                        retries_used: retries,
                    });
                }
                Ok(PassOutcome::Conflict) => {
                    retries += 1;
                    if retries >= self.config.max_attempts {
                        tracing::warn!(
                            pipeline_id = %pipeline_id,
                            job_id = %trigger.job_id,
                            retries,
                            "optimistic retries exhausted, surfacing conflict"
                        );
                        return Ok(ProcessingResult {
                            succeeded: false,
                            conflict: true,
                            retries_used: retries,
                        });
                    }
                    tracing::debug!(
                        pipeline_id = %pipeline_id,
                        attempt = retries,
                        "version conflict, reloading snapshot"
                    );
                }
                Ok(PassOutcome::Dropped) => {
                    return Ok(ProcessingResult {
                        succeeded: false,
                        conflict: false,
                        retries_used: retries,
                    });
                }
                Err(ProcessError::Store(
                    e @ (StoreError::PipelineNotFound(_) | StoreError::JobNotFound(_)),
                )) => {
                    tracing::warn!(
                        pipeline_id = %pipeline_id,
                        error = %e,
                        "referenced record no longer exists, dropping pass"
                    );
                    return Ok(ProcessingResult {
                        succeeded: false,
                        conflict: false,
                        retries_used: retries,
                    });
                }
                Err(ProcessError::Store(StoreError::Io(reason))) => {
                    io_failures += 1;
                    if io_failures > self.config.io_retry_limit {
                        tracing::warn!(
                            pipeline_id = %pipeline_id,
                            error = %reason,
                            "storage unavailable, giving up on this pass"
                        );
                        return Ok(ProcessingResult {
                            succeeded: false,
                            conflict: false,
                            retries_used: retries,
                        });
                    }
                    sleep(self.config.backoff * io_failures).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Latest committed pipeline status, never from an in-flight snapshot
    pub async fn current_status(
        &self,
        pipeline_id: &PipelineId,
    ) -> Result<CompositeStatus, ProcessError> {
        Ok(self.store.pipeline_status(pipeline_id).await?.status)
    }

    /// Latest committed status of one stage
    pub async fn current_stage_status(
        &self,
        pipeline_id: &PipelineId,
        stage_idx: u32,
    ) -> Result<CompositeStatus, ProcessError> {
        Ok(self.store.stage_status(pipeline_id, stage_idx).await?.status)
    }

    /// One whole pass against a fresh snapshot
    async fn attempt(
        &self,
        pipeline_id: &PipelineId,
        trigger: &Trigger,
    ) -> Result<PassOutcome, ProcessError> {
        let mut snapshot = match JobSnapshot::load(&self.store, pipeline_id).await {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::NoJobs(_)) => {
                tracing::debug!(pipeline_id = %pipeline_id, "no current jobs, nothing to process");
                return Ok(PassOutcome::Empty);
            }
            Err(SnapshotError::Store(e)) => return Err(ProcessError::Store(e)),
            Err(e) => return Err(ProcessError::Snapshot(e)),
        };

        let Some(job) = snapshot.job(&trigger.job_id) else {
            tracing::warn!(
                pipeline_id = %pipeline_id,
                job_id = %trigger.job_id,
                "trigger references an unknown job, dropping pass"
            );
            return Ok(PassOutcome::Dropped);
        };
        let trigger_stage = job.stage_idx;

        // Persist the trigger's transition unless it already landed
        if job.status != trigger.new_status {
            let outcome = self
                .store
                .compare_and_swap_job_status(
                    pipeline_id,
                    &trigger.job_id,
                    trigger.new_status,
                    trigger.expected_lock_version,
                )
                .await?;
            if outcome == CasOutcome::Conflict {
                return Ok(PassOutcome::Conflict);
            }
            snapshot.set_job_status(
                &trigger.job_id,
                trigger.new_status,
                trigger.expected_lock_version + 1,
            );
        }

        // Stages whose composite must be recommitted this pass: the
        // trigger's own, plus those of terminal outcomes no earlier pass
        // folded in (e.g. a sibling's pass that lost its race and dropped)
        let mut affected: BTreeSet<u32> = BTreeSet::new();
        affected.insert(trigger_stage);
        let mut saw_unfolded_terminal = false;
        let unprocessed: Vec<JobId> = snapshot.processing_jobs().collect();
        for id in &unprocessed {
            if let Some(job) = snapshot.job(id) {
                if job.status.is_terminal() {
                    affected.insert(job.stage_idx);
                    saw_unfolded_terminal = true;
                }
            }
        }

        if trigger.new_status.is_terminal() || saw_unfolded_terminal {
            let released = self
                .release_stage_jobs(pipeline_id, &mut snapshot, trigger_stage, &mut affected)
                .await?;
            if released == CasOutcome::Conflict {
                return Ok(PassOutcome::Conflict);
            }
            let released = self
                .release_dag_jobs(pipeline_id, &mut snapshot, &mut affected)
                .await?;
            if released == CasOutcome::Conflict {
                return Ok(PassOutcome::Conflict);
            }
        }

        for stage_idx in affected {
            let committed = self
                .commit_stage(pipeline_id, &mut snapshot, stage_idx)
                .await?;
            if committed == CasOutcome::Conflict {
                return Ok(PassOutcome::Conflict);
            }
        }

        let committed = self.commit_pipeline(pipeline_id, &mut snapshot).await?;
        if committed == CasOutcome::Conflict {
            return Ok(PassOutcome::Conflict);
        }

        // The pass landed: terminal outcomes drained above are now folded
        // into a committed recomputation, so the next snapshot skips them
        for id in &unprocessed {
            let terminal = snapshot.job(id).is_some_and(|job| job.status.is_terminal());
            if terminal {
                self.store.mark_job_processed(pipeline_id, id).await?;
            }
        }

        Ok(PassOutcome::Committed)
    }

    /// Walk stages after the trigger's and release (or skip) their gated
    /// jobs once every earlier stage is terminal
    async fn release_stage_jobs(
        &self,
        pipeline_id: &PipelineId,
        snapshot: &mut JobSnapshot,
        from_stage: u32,
        affected: &mut BTreeSet<u32>,
    ) -> Result<CasOutcome, ProcessError> {
        for stage_idx in snapshot.stage_indexes() {
            if stage_idx <= from_stage {
                continue;
            }
            let prior = snapshot.status_of_jobs_prior_to_stage(stage_idx);
            if !prior.is_terminal() {
                break;
            }
            let target = if prior.is_blocking() {
                JobStatus::Skipped
            } else {
                JobStatus::Pending
            };

            for id in snapshot.created_job_ids_in_stage(stage_idx) {
                let Some(job) = snapshot.job(&id) else { continue };
                // dag jobs gate on their needs, not on stage order
                if job.is_dag() {
                    continue;
                }
                let version = job.lock_version;

                let outcome = self
                    .store
                    .compare_and_swap_job_status(pipeline_id, &id, target, version)
                    .await?;
                if outcome == CasOutcome::Conflict {
                    return Ok(CasOutcome::Conflict);
                }
                snapshot.set_job_status(&id, target, version + 1);
                affected.insert(stage_idx);
                tracing::debug!(
                    pipeline_id = %pipeline_id,
                    job_id = %id,
                    stage = stage_idx,
                    status = %target,
                    "released stage-gated job"
                );
            }
        }
        Ok(CasOutcome::Committed)
    }

    /// Release dag jobs whose needs all completed; skip those gated on a
    /// stopped job. Skips cascade within the pass: a dependent skipped here
    /// stops its own dependents further down the candidate list.
    async fn release_dag_jobs(
        &self,
        pipeline_id: &PipelineId,
        snapshot: &mut JobSnapshot,
        affected: &mut BTreeSet<u32>,
    ) -> Result<CasOutcome, ProcessError> {
        let mut stopped: HashSet<String> = snapshot.stopped_job_names().into_iter().collect();
        let candidates: Vec<(JobId, String, Vec<String>, u64, u32)> = snapshot
            .jobs()
            .filter(|job| job.status == JobStatus::Created && job.is_dag())
            .map(|job| {
                (
                    job.id.clone(),
                    job.name.clone(),
                    job.needs.clone(),
                    job.lock_version,
                    job.stage_idx,
                )
            })
            .collect();

        for (id, name, needs, version, stage_idx) in candidates {
            let target = if needs.iter().any(|need| stopped.contains(need)) {
                JobStatus::Skipped
            } else if snapshot.status_of_jobs(&needs).is_complete_success() {
                JobStatus::Pending
            } else {
                continue;
            };

            let outcome = self
                .store
                .compare_and_swap_job_status(pipeline_id, &id, target, version)
                .await?;
            if outcome == CasOutcome::Conflict {
                return Ok(CasOutcome::Conflict);
            }
            snapshot.set_job_status(&id, target, version + 1);
            affected.insert(stage_idx);
            if target == JobStatus::Skipped {
                stopped.insert(name);
            }
            tracing::debug!(
                pipeline_id = %pipeline_id,
                job_id = %id,
                status = %target,
                "resolved dag-gated job"
            );
        }
        Ok(CasOutcome::Committed)
    }

    /// Commit one stage's recomputed composite if it changed and the change
    /// does not regress a terminal status
    async fn commit_stage(
        &self,
        pipeline_id: &PipelineId,
        snapshot: &mut JobSnapshot,
        stage_idx: u32,
    ) -> Result<CasOutcome, ProcessError> {
        let computed = snapshot.status_of_stage(stage_idx);
        let record = self.store.stage_status(pipeline_id, stage_idx).await?;
        if record.status == computed {
            return Ok(CasOutcome::Committed);
        }
        if record.status.is_terminal() && !computed.is_terminal() {
            tracing::debug!(
                pipeline_id = %pipeline_id,
                stage = stage_idx,
                persisted = %record.status,
                computed = %computed,
                "stale recompute, keeping terminal stage status"
            );
            return Ok(CasOutcome::Committed);
        }
        Ok(self
            .store
            .compare_and_swap_stage_status(pipeline_id, stage_idx, computed, record.lock_version)
            .await?)
    }

    /// Commit the recomputed pipeline composite under the same rules
    async fn commit_pipeline(
        &self,
        pipeline_id: &PipelineId,
        snapshot: &mut JobSnapshot,
    ) -> Result<CasOutcome, ProcessError> {
        let computed = snapshot.status_of_all();
        let record = self.store.pipeline_status(pipeline_id).await?;
        if record.status == computed {
            return Ok(CasOutcome::Committed);
        }
        if record.status.is_terminal() && !computed.is_terminal() {
            tracing::debug!(
                pipeline_id = %pipeline_id,
                persisted = %record.status,
                computed = %computed,
                "stale recompute, keeping terminal pipeline status"
            );
            return Ok(CasOutcome::Committed);
        }
        Ok(self
            .store
            .compare_and_swap_pipeline_status(pipeline_id, computed, record.lock_version)
            .await?)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
