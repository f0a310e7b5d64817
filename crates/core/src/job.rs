// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and pipeline identity plus the in-memory job model

use crate::compose::StatusEntry;
use crate::status::{JobStatus, UnknownStatus};
use crate::store::JobRow;
use serde::{Deserialize, Serialize};

/// Unique identifier for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineId(pub String);

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PipelineId {
    fn from(s: String) -> Self {
        PipelineId(s)
    }
}

impl From<&str> for PipelineId {
    fn from(s: &str) -> Self {
        PipelineId(s.to_string())
    }
}

/// Unique identifier for a job within a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// A pipeline job as seen by one processing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    /// Position in the total stage order
    pub stage_idx: u32,
    /// A failure of this job does not fail its stage
    pub allow_failure: bool,
    /// Names of jobs this job waits on; empty means stage-ordered
    pub needs: Vec<String>,
    /// Terminal outcome already folded into a prior recomputation
    pub processed: bool,
    pub lock_version: u64,
}

impl Job {
    /// Parse a raw stored row, rejecting unknown status strings outright
    pub fn from_row(row: JobRow) -> Result<Self, UnknownStatus> {
        let status = row.status.parse()?;
        Ok(Self {
            id: row.id,
            name: row.name,
            status,
            stage_idx: row.stage_idx,
            allow_failure: row.allow_failure,
            needs: row.needs,
            processed: row.processed,
            lock_version: row.lock_version,
        })
    }

    /// This job's contribution to a composite merge
    pub fn entry(&self) -> StatusEntry {
        StatusEntry::new(self.status, self.allow_failure)
    }

    /// Gated by explicit dependency edges rather than stage order
    pub fn is_dag(&self) -> bool {
        !self.needs.is_empty()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
