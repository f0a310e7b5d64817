// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fault-injection wrapper for exercising retry paths
//!
//! Wraps any store and serves a scripted queue of conflicts or I/O errors
//! before delegating. Used by engine and workspace tests to simulate racing
//! writers and transient storage failures.

use async_trait::async_trait;
use sluice_core::{
    CasOutcome, CompositeStatus, JobId, JobRow, JobStatus, JobStore, PipelineId, StatusRecord,
    StatusWriter, StoreError,
};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Faults {
    write_conflicts: u32,
    read_io: u32,
    write_io: u32,
}

/// Store wrapper with scripted fault queues
#[derive(Debug, Clone)]
pub struct FaultStore<S> {
    inner: S,
    faults: Arc<Mutex<Faults>>,
}

impl<S> FaultStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Force the next `n` compare-and-swap calls to report a conflict
    pub fn fail_next_writes(&self, n: u32) {
        self.faults().write_conflicts = n;
    }

    /// Force the next `n` reads to fail with an I/O error
    pub fn fail_next_reads_io(&self, n: u32) {
        self.faults().read_io = n;
    }

    /// Force the next `n` compare-and-swap calls to fail with an I/O error
    pub fn fail_next_writes_io(&self, n: u32) {
        self.faults().write_io = n;
    }

    fn take_read_io(&self) -> Result<(), StoreError> {
        let mut faults = self.faults();
        if faults.read_io > 0 {
            faults.read_io -= 1;
            return Err(StoreError::Io("injected read failure".to_string()));
        }
        Ok(())
    }

    fn take_write_fault(&self) -> Result<Option<CasOutcome>, StoreError> {
        let mut faults = self.faults();
        if faults.write_io > 0 {
            faults.write_io -= 1;
            return Err(StoreError::Io("injected write failure".to_string()));
        }
        if faults.write_conflicts > 0 {
            faults.write_conflicts -= 1;
            return Ok(Some(CasOutcome::Conflict));
        }
        Ok(None)
    }
}

#[async_trait]
impl<S: JobStore> JobStore for FaultStore<S> {
    async fn list_current_jobs(&self, pipeline: &PipelineId) -> Result<Vec<JobRow>, StoreError> {
        self.take_read_io()?;
        self.inner.list_current_jobs(pipeline).await
    }

    async fn pipeline_status(&self, pipeline: &PipelineId) -> Result<StatusRecord, StoreError> {
        self.take_read_io()?;
        self.inner.pipeline_status(pipeline).await
    }

    async fn stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
    ) -> Result<StatusRecord, StoreError> {
        self.take_read_io()?;
        self.inner.stage_status(pipeline, stage_idx).await
    }
}

#[async_trait]
impl<S: StatusWriter> StatusWriter for FaultStore<S> {
    async fn compare_and_swap_job_status(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
        new_status: JobStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        if let Some(outcome) = self.take_write_fault()? {
            return Ok(outcome);
        }
        self.inner
            .compare_and_swap_job_status(pipeline, id, new_status, expected_lock_version)
            .await
    }

    async fn compare_and_swap_stage_status(
        &self,
        pipeline: &PipelineId,
        stage_idx: u32,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        if let Some(outcome) = self.take_write_fault()? {
            return Ok(outcome);
        }
        self.inner
            .compare_and_swap_stage_status(pipeline, stage_idx, new_status, expected_lock_version)
            .await
    }

    async fn compare_and_swap_pipeline_status(
        &self,
        pipeline: &PipelineId,
        new_status: CompositeStatus,
        expected_lock_version: u64,
    ) -> Result<CasOutcome, StoreError> {
        if let Some(outcome) = self.take_write_fault()? {
            return Ok(outcome);
        }
        self.inner
            .compare_and_swap_pipeline_status(pipeline, new_status, expected_lock_version)
            .await
    }

    async fn mark_job_processed(
        &self,
        pipeline: &PipelineId,
        id: &JobId,
    ) -> Result<(), StoreError> {
        self.inner.mark_job_processed(pipeline, id).await
    }
}

#[cfg(test)]
#[path = "fault_tests.rs"]
mod tests;
