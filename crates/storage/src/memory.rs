// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference store with optimistic lock_version semantics
//!
//! Jobs are never deleted: a retry marks the old row superseded and inserts
//! a fresh one, so `list_current_jobs` always returns the latest attempt
//! only. Stage and pipeline status rows are created alongside the jobs.

use async_trait::async_trait;
use sluice_core::{
    CasOutcome, CompositeStatus, JobId, JobRow, JobStatus, JobStore, PipelineId, StatusRecord,
    StatusWriter, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Builder-style description of a job to seed
#[derive(Debug, Clone)]
pub struct JobSeed {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub stage_idx: u32,
    pub allow_failure: bool,
    pub needs: Vec<String>,
}

impl JobSeed {
    pub fn new(id: impl Into<JobId>, name: impl Into<String>, stage_idx: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: JobStatus::Created,
            stage_idx,
            allow_failure: false,
            needs: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    pub fn with_needs(mut self, needs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.needs = needs.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
struct StoredJob {
    name: String,
    /// Raw string: the execution subsystem owns this column and may write
    /// values this engine does not recognize
    status: String,
    stage_idx: u32,
    allow_failure: bool,
    needs: Vec<String>,
    processed: bool,
    lock_version: u64,
    superseded: bool,
}

#[derive(Debug, Default)]
struct PipelineRecord {
    status: StatusRecord,
    stages: BTreeMap<u32, StatusRecord>,
    jobs: BTreeMap<JobId, StoredJob>,
}

#[derive(Debug, Default)]
struct Inner {
    pipelines: HashMap<PipelineId, PipelineRecord>,
}

/// Shared in-memory store; clones are handles to the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a pipeline with an initial `created` status row
    pub fn create_pipeline(&self, id: &PipelineId) {
        self.lock().pipelines.entry(id.clone()).or_default();
    }

    /// Insert a job row, creating its stage status row if needed
    pub fn insert_job(&self, pipeline: &PipelineId, seed: JobSeed) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        record.stages.entry(seed.stage_idx).or_default();
        record.jobs.insert(
            seed.id,
            StoredJob {
                name: seed.name,
                status: seed.status.to_string(),
                stage_idx: seed.stage_idx,
                allow_failure: seed.allow_failure,
                needs: seed.needs,
                processed: false,
                lock_version: 0,
                superseded: false,
            },
        );
        Ok(())
    }

    /// Soft-retire a job and insert its replacement attempt
    pub fn retry_job(
        &self,
        pipeline: &PipelineId,
        old: &JobId,
        seed: JobSeed,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.lock();
            let record = inner
                .pipelines
                .get_mut(pipeline)
                .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
            let job = record
                .jobs
                .get_mut(old)
                .ok_or_else(|| StoreError::JobNotFound(old.clone()))?;
            job.superseded = true;
        }
        self.insert_job(pipeline, seed)
    }

    /// External cancellation: terminal pipeline status, version bumped so
    /// any in-flight pass conflicts at commit
    pub fn cancel_pipeline(&self, id: &PipelineId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(id)
            .ok_or_else(|| StoreError::PipelineNotFound(id.clone()))?;
        record.status.status = CompositeStatus::Canceled;
        record.status.lock_version += 1;
        Ok(())
    }

    /// Overwrite a job's raw status column, as the execution subsystem would
    pub fn set_raw_job_status(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
        raw: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let job = record
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        job.status = raw.to_string();
        job.lock_version += 1;
        Ok(())
    }

    /// Current persisted row for one job
    pub fn job_row(&self, pipeline: &PipelineId, id: &JobId) -> Result<JobRow, StoreError> {
        let inner = self.lock();
        let record = inner
            .pipelines
            .get(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let job = record
            .jobs
            .get(id)
            .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        Ok(row_of(id, job))
    }

    pub fn job_lock_version(&self, pipeline: &PipelineId, id: &JobId) -> Result<u64, StoreError> {
        self.job_row(pipeline, id).map(|row| row.lock_version)
    }
}

fn row_of(id: &JobId, job: &StoredJob) -> JobRow {
    JobRow {
        id: id.clone(),
        name: job.name.clone(),
        status: job.status.clone(),
        stage_idx: job.stage_idx,
        allow_failure: job.allow_failure,
        needs: job.needs.clone(),
        processed: job.processed,
        lock_version: job.lock_version,
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn list_current_jobs(&self, pipeline: &PipelineId) -> Result<Vec<JobRow>, StoreError> {
        let inner = self.lock();
        let record = inner
            .pipelines
            .get(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let mut rows: Vec<JobRow> = record
            .jobs
            .iter()
            .filter(|(_, job)| !job.superseded)
            .map(|(id, job)| row_of(id, job))
            .collect();
        rows.sort_by(|a, b| (a.stage_idx, &a.id).cmp(&(b.stage_idx, &b.id)));
        Ok(rows)
    }

    async fn pipeline_status(&self, pipeline: &PipelineId) -> Result<StatusRecord, StoreError> {
        let inner = self.lock();
        inner
            .pipelines
            .get(pipeline)
            .map(|record| record.status)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))
    }

    async fn stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
    ) -> Result<StatusRecord, StoreError> {
        let inner = self.lock();
        let record = inner
            .pipelines
            .get(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        record
            .stages
            .get(&stage_idx)
            .copied()
            .ok_or(StoreError::StageNotFound(stage_idx))
    }
}

#[async_trait]
impl StatusWriter for MemoryStore {
    async fn compare_and_swap_job_status(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
        new_status: JobStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let job = record
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        if job.lock_version != expected_lock_version {
            return Ok(CasOutcome::Conflict);
        }
        job.status = new_status.to_string();
        job.lock_version += 1;
        if new_status.is_terminal() {
            // the terminal outcome is folded by this very commit
            job.processed = true;
        }
        Ok(CasOutcome::Committed)
    }

    async fn compare_and_swap_stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let stage = record
            .stages
            .get_mut(&stage_idx)
            .ok_or(StoreError::StageNotFound(stage_idx))?;
        if stage.lock_version != expected_lock_version {
            return Ok(CasOutcome::Conflict);
        }
        stage.status = new_status;
        stage.lock_version += 1;
        Ok(CasOutcome::Committed)
    }

    async fn compare_and_swap_pipeline_status(
        &self,
        pipeline: &PipelineId,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        if record.status.lock_version != expected_lock_version {
            return Ok(CasOutcome::Conflict);
        }
        record.status.status = new_status;
        record.status.lock_version += 1;
        Ok(CasOutcome::Committed)
    }

    async fn mark_job_processed(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| StoreError::PipelineNotFound(pipeline.clone()))?;
        let job = record
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        // no version bump: in-flight passes must not conflict on this flag
        job.processed = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
