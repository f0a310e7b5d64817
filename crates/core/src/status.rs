// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and composite status enums

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Recorded but not yet eligible to run (stage/dag gate not open)
    Created,
    /// Eligible to run, waiting for a runner
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully
    Success,
    /// Finished with a failure
    Failed,
    /// Canceled before completion
    Canceled,
    /// Never ran because an earlier stage or prerequisite stopped
    Skipped,
}

impl JobStatus {
    /// Terminal statuses never transition further within a pipeline attempt
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled | JobStatus::Skipped
        )
    }

    /// Whether the job has left the queue
    pub fn is_started(self) -> bool {
        !matches!(self, JobStatus::Created | JobStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status string is not a member of the enum.
///
/// Unknown statuses must fail the pass; defaulting one would corrupt the
/// priority merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(JobStatus::Created),
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            "skipped" => Ok(JobStatus::Skipped),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Aggregate status of a stage, a named job set, or a whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStatus {
    Created,
    Pending,
    Running,
    Success,
    /// All jobs succeeded but at least one allowed failure occurred
    SuccessWithWarnings,
    Failed,
    Canceled,
    Skipped,
}

impl CompositeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CompositeStatus::Success
                | CompositeStatus::SuccessWithWarnings
                | CompositeStatus::Failed
                | CompositeStatus::Canceled
                | CompositeStatus::Skipped
        )
    }

    /// Terminal and halting: later stages must not start
    pub fn is_blocking(self) -> bool {
        matches!(self, CompositeStatus::Failed | CompositeStatus::Canceled)
    }

    /// Terminal and non-blocking: dependents may be released
    pub fn is_complete_success(self) -> bool {
        matches!(
            self,
            CompositeStatus::Success
                | CompositeStatus::SuccessWithWarnings
                | CompositeStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompositeStatus::Created => "created",
            CompositeStatus::Pending => "pending",
            CompositeStatus::Running => "running",
            CompositeStatus::Success => "success",
            CompositeStatus::SuccessWithWarnings => "success_with_warnings",
            CompositeStatus::Failed => "failed",
            CompositeStatus::Canceled => "canceled",
            CompositeStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for CompositeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobStatus> for CompositeStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Created => CompositeStatus::Created,
            JobStatus::Pending => CompositeStatus::Pending,
            JobStatus::Running => CompositeStatus::Running,
            JobStatus::Success => CompositeStatus::Success,
            JobStatus::Failed => CompositeStatus::Failed,
            JobStatus::Canceled => CompositeStatus::Canceled,
            JobStatus::Skipped => CompositeStatus::Skipped,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
