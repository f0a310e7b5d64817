// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow persistence interface the engine talks through
//!
//! The durable store itself is a collaborator; this crate only defines the
//! batched read and compare-and-swap write contracts it must honor.

use crate::job::{JobId, PipelineId};
use crate::status::{CompositeStatus, JobStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw persisted shape of a job.
///
/// The status arrives as a string because the execution subsystem, not this
/// engine, writes it; parsing happens at snapshot load so a malformed value
/// fails the pass instead of leaking into a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: JobId,
    pub name: String,
    pub status: String,
    pub stage_idx: u32,
    pub allow_failure: bool,
    pub needs: Vec<String>,
    pub processed: bool,
    pub lock_version: u64,
}

/// A committed stage or pipeline status row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: CompositeStatus,
    pub lock_version: u64,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            status: CompositeStatus::Created,
            lock_version: 0,
        }
    }
}

/// Result of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected version matched and the write landed
    Committed,
    /// Someone else committed first; nothing was written
    Conflict,
}

/// Errors from the store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("pipeline not found: {0}")]
    PipelineNotFound(PipelineId),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("stage not found: {0}")]
    StageNotFound(u32),
    #[error("storage i/o: {0}")]
    Io(String),
}

/// Read side: batched job listing and committed status lookups
#[async_trait]
pub trait JobStore: Clone + Send + Sync + 'static {
    /// All current (non-superseded) jobs of a pipeline, ordered by stage
    async fn list_current_jobs(&self, pipeline: &PipelineId) -> Result<Vec<JobRow>, StoreError>;

    /// Latest committed pipeline status
    async fn pipeline_status(&self, pipeline: &PipelineId) -> Result<StatusRecord, StoreError>;

    /// Latest committed status of one stage
    async fn stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
    ) -> Result<StatusRecord, StoreError>;
}

/// Write side: optimistic compare-and-swap per status field
#[async_trait]
pub trait StatusWriter: Clone + Send + Sync + 'static {
    async fn compare_and_swap_job_status(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
        new_status: JobStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError>;

    async fn compare_and_swap_stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError>;

    async fn compare_and_swap_pipeline_status(
        &self,
        pipeline: &PipelineId,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError>;

    /// Record that a job's terminal outcome has been folded into a committed
    /// recomputation. Not version-guarded: the flag only ever advances.
    async fn mark_job_processed(&self, pipeline: &PipelineId, id: &JobId)
        -> Result<(), StoreError>;
}
