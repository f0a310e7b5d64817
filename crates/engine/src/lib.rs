//! sluice-engine: Atomic processing passes over pipeline snapshots
//!
//! This crate provides:
//! - `ProcessingCoordinator` driving one bounded-retry pass per trigger
//! - Stage and dag gating that releases or skips downstream jobs
//! - Committed-state status reads for display callers

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::CoordinatorConfig;
pub use coordinator::{ProcessingCoordinator, ProcessingResult, Trigger};
pub use error::ProcessError;
