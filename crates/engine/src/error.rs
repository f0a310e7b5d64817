// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the processing engine

use sluice_core::{SnapshotError, StoreError};
use thiserror::Error;

/// Errors that can fail a processing pass outright.
///
/// Version conflicts and dropped passes are not errors; they are reported
/// through `ProcessingResult`. What remains here is malformed data (never
/// silently coerced) and store failures that survived the retry budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
