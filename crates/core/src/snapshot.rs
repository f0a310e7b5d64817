// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-pass, in-memory view of a pipeline's current jobs
//!
//! A snapshot is built once per processing pass from a single batched read,
//! mutated in memory as the pass discovers transitions, queried repeatedly
//! through a memo cache, and discarded when the pass commits or aborts.

use crate::compose::{compose, StatusEntry};
use crate::job::{Job, JobId, PipelineId};
use crate::status::{CompositeStatus, JobStatus};
use crate::store::{JobRow, JobStore, StoreError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

/// Key identifying one memoized composite query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeQuery {
    /// Every current job
    All,
    /// All jobs sharing one stage index
    Stage(u32),
    /// All jobs in stages strictly before the index
    PriorToStage(u32),
    /// An explicit named subset (dag edges); names sorted and deduplicated
    Jobs(Vec<String>),
}

/// Errors building a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// The pipeline has no current jobs. Callers treat this as a valid,
    /// trivially-successful pipeline, not a failure.
    #[error("no current jobs for pipeline: {0}")]
    NoJobs(PipelineId),
    #[error("malformed job row {id}: {reason}")]
    MalformedRow { id: JobId, reason: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Immutable-for-the-pass copy of a pipeline's current jobs, with indices
/// and a memo cache scoped to the snapshot's lifetime
#[derive(Debug, PartialEq)]
pub struct JobSnapshot {
    pipeline_id: PipelineId,
    jobs: Vec<Job>,
    by_id: HashMap<JobId, usize>,
    by_name: HashMap<String, usize>,
    by_stage: BTreeMap<u32, Vec<usize>>,
    /// Jobs whose terminal outcome has not yet been folded; drained once
    unprocessed: VecDeque<JobId>,
    memo: HashMap<CompositeQuery, CompositeStatus>,
}

impl JobSnapshot {
    /// Load all current jobs of a pipeline in one batched read
    pub async fn load(
        store: &impl JobStore,
        pipeline_id: &PipelineId,
    ) -> Result<Self, SnapshotError> {
        let rows = store.list_current_jobs(pipeline_id).await?;
        Self::from_rows(pipeline_id.clone(), rows)
    }

    /// Build a snapshot from already-fetched rows
    pub fn from_rows(pipeline_id: PipelineId, rows: Vec<JobRow>) -> Result<Self, SnapshotError> {
        if rows.is_empty() {
            return Err(SnapshotError::NoJobs(pipeline_id));
        }

        let mut jobs = Vec::with_capacity(rows.len());
        let mut by_id = HashMap::with_capacity(rows.len());
        let mut by_name = HashMap::with_capacity(rows.len());
        let mut by_stage: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        let mut unprocessed = VecDeque::new();

        for row in rows {
            let id = row.id.clone();
            let job = Job::from_row(row).map_err(|e| SnapshotError::MalformedRow {
                id: id.clone(),
                reason: e.to_string(),
            })?;

            let idx = jobs.len();
            if by_id.insert(job.id.clone(), idx).is_some() {
                return Err(SnapshotError::MalformedRow {
                    id,
                    reason: "duplicate job id".to_string(),
                });
            }
            if by_name.insert(job.name.clone(), idx).is_some() {
                return Err(SnapshotError::MalformedRow {
                    id,
                    reason: format!("duplicate job name: {}", job.name),
                });
            }
            by_stage.entry(job.stage_idx).or_default().push(idx);
            if !job.processed {
                unprocessed.push_back(job.id.clone());
            }
            jobs.push(job);
        }

        Ok(Self {
            pipeline_id,
            jobs,
            by_id,
            by_name,
            by_stage,
            unprocessed,
            memo: HashMap::new(),
        })
    }

    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.by_id.get(id).map(|&idx| &self.jobs[idx])
    }

    pub fn job_by_name(&self, name: &str) -> Option<&Job> {
        self.by_name.get(name).map(|&idx| &self.jobs[idx])
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Distinct stage indices present, in order
    pub fn stage_indexes(&self) -> Vec<u32> {
        self.by_stage.keys().copied().collect()
    }

    /// Fold a discovered transition into the in-memory copy.
    ///
    /// Storage is never touched; an unknown id is a no-op. Any cached
    /// composite may now be stale, so the memo cache is cleared.
    pub fn set_job_status(&mut self, id: &JobId, status: JobStatus, lock_version: u64) {
        let Some(&idx) = self.by_id.get(id) else {
            tracing::debug!(job_id = %id, "ignoring status update for unknown job");
            return;
        };
        self.jobs[idx].status = status;
        self.jobs[idx].lock_version = lock_version;
        self.memo.clear();
    }

    /// Composite status over every current job
    pub fn status_of_all(&mut self) -> CompositeStatus {
        self.composed(CompositeQuery::All)
    }

    /// Composite status of one stage
    pub fn status_of_stage(&mut self, stage_idx: u32) -> CompositeStatus {
        self.composed(CompositeQuery::Stage(stage_idx))
    }

    /// Composite status of an explicit named subset (dag mode).
    ///
    /// Names with no current job are skipped; a superseded attempt may
    /// still be referenced by a dependent's edge list.
    pub fn status_of_jobs(&mut self, names: &[String]) -> CompositeStatus {
        let mut key: Vec<String> = names.to_vec();
        key.sort();
        key.dedup();
        self.composed(CompositeQuery::Jobs(key))
    }

    /// Composite status of every stage strictly before the index (stage mode)
    pub fn status_of_jobs_prior_to_stage(&mut self, stage_idx: u32) -> CompositeStatus {
        self.composed(CompositeQuery::PriorToStage(stage_idx))
    }

    /// Jobs in the stage still waiting behind the stage gate
    pub fn created_job_ids_in_stage(&self, stage_idx: u32) -> Vec<JobId> {
        self.by_stage
            .get(&stage_idx)
            .into_iter()
            .flatten()
            .map(|&idx| &self.jobs[idx])
            .filter(|job| job.status == JobStatus::Created)
            .map(|job| job.id.clone())
            .collect()
    }

    /// Names of jobs that ended in a state dependents must not start after.
    ///
    /// A failed job with `allow_failure` counts as complete, not stopped.
    pub fn stopped_job_names(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| match job.status {
                JobStatus::Failed => !job.allow_failure,
                JobStatus::Canceled | JobStatus::Skipped => true,
                _ => false,
            })
            .map(|job| job.name.clone())
            .collect()
    }

    /// One-shot sequence of jobs whose terminal outcome has not been folded
    /// into a recomputation yet. Consuming it marks progress for this pass;
    /// the next pass re-derives it from a fresh snapshot.
    pub fn processing_jobs(&mut self) -> impl Iterator<Item = JobId> + '_ {
        self.unprocessed.drain(..)
    }

    fn composed(&mut self, key: CompositeQuery) -> CompositeStatus {
        if let Some(&status) = self.memo.get(&key) {
            return status;
        }
        let status = compose(self.entries_for(&key));
        self.memo.insert(key, status);
        status
    }

    fn entries_for(&self, key: &CompositeQuery) -> Vec<StatusEntry> {
        match key {
            CompositeQuery::All => self.jobs.iter().map(Job::entry).collect(),
            CompositeQuery::Stage(stage_idx) => self
                .by_stage
                .get(stage_idx)
                .into_iter()
                .flatten()
                .map(|&idx| self.jobs[idx].entry())
                .collect(),
            CompositeQuery::PriorToStage(stage_idx) => self
                .by_stage
                .range(..*stage_idx)
                .flat_map(|(_, idxs)| idxs.iter())
                .map(|&idx| self.jobs[idx].entry())
                .collect(),
            CompositeQuery::Jobs(names) => names
                .iter()
                .filter_map(|name| self.job_by_name(name))
                .map(Job::entry)
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
