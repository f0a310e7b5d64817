//! Behavioral specifications for the sluice status engine.
//!
//! These tests are black-box: they wire the engine to the reference store
//! through the public crate APIs and verify committed state only.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// pipeline/
#[path = "specs/pipeline/processing.rs"]
mod pipeline_processing;

#[path = "specs/pipeline/concurrency.rs"]
mod pipeline_concurrency;
