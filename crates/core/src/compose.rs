// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite status merge
//!
//! Pure, commutative merge of many `(status, allow_failure)` pairs into one
//! aggregate status. Entry selection (whole stage, prior stages, named set)
//! is the snapshot's concern; the merge rule is the same for all of them.

use crate::status::{CompositeStatus, JobStatus};

/// One job's contribution to a composite status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: JobStatus,
    pub allow_failure: bool,
}

impl StatusEntry {
    pub fn new(status: JobStatus, allow_failure: bool) -> Self {
        Self {
            status,
            allow_failure,
        }
    }
}

/// Merge entries into a single composite status.
///
/// Highest-severity status wins: failed > running > pending > canceled >
/// skipped > success. A `failed` entry with `allow_failure` set is excluded
/// from the scan and instead downgrades an all-success result to
/// `success_with_warnings`. Empty input merges to `success`.
pub fn compose<I>(entries: I) -> CompositeStatus
where
    I: IntoIterator<Item = StatusEntry>,
{
    let mut warnings = false;
    let mut winner: Option<CompositeStatus> = None;

    for entry in entries {
        if entry.allow_failure && entry.status == JobStatus::Failed {
            warnings = true;
            continue;
        }

        let contribution = contribution(entry.status);
        winner = Some(match winner {
            None => contribution,
            Some(current) if severity(contribution) > severity(current) => contribution,
            Some(current) => current,
        });
    }

    match winner {
        Some(CompositeStatus::Success) | None if warnings => {
            CompositeStatus::SuccessWithWarnings
        }
        Some(status) => status,
        None => CompositeStatus::Success,
    }
}

/// What a single job status contributes to the merge.
///
/// `created` and `pending` both read as "queued but not started", so they
/// collapse to a single composite.
fn contribution(status: JobStatus) -> CompositeStatus {
    match status {
        JobStatus::Created | JobStatus::Pending => CompositeStatus::Pending,
        other => CompositeStatus::from(other),
    }
}

fn severity(status: CompositeStatus) -> u8 {
    match status {
        CompositeStatus::Failed => 6,
        CompositeStatus::Running => 5,
        CompositeStatus::Pending | CompositeStatus::Created => 4,
        CompositeStatus::Canceled => 3,
        CompositeStatus::Skipped => 2,
        CompositeStatus::Success | CompositeStatus::SuccessWithWarnings => 1,
    }
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
