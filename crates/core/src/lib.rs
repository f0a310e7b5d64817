//! sluice-core: Domain core for pipeline status aggregation
//!
//! This crate provides:
//! - The job/composite status model and the pure composite merge
//! - The per-pass `JobSnapshot` with indexed, memoized composite queries
//! - The narrow store traits the processing engine talks through

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod compose;
pub mod job;
pub mod snapshot;
pub mod status;
pub mod store;

// Re-exports
pub use compose::{compose, StatusEntry};
pub use job::{Job, JobId, PipelineId};
pub use snapshot::{CompositeQuery, JobSnapshot, SnapshotError};
pub use status::{CompositeStatus, JobStatus, UnknownStatus};
pub use store::{CasOutcome, JobRow, JobStore, StatusRecord, StatusWriter, StoreError};
