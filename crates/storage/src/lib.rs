//! sluice-storage: Reference stores for the status engine
//!
//! `MemoryStore` implements the core store traits with real optimistic
//! lock_version semantics; `FaultStore` wraps any store with scripted
//! conflict and I/O faults for exercising retry paths.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod fault;
pub mod memory;

pub use fault::FaultStore;
pub use memory::{JobSeed, MemoryStore};
