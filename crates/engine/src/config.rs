// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for optimistic and I/O retries of one processing pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Whole-pass attempts before a version conflict is surfaced
    pub max_attempts: u32,
    /// Transient I/O failures tolerated before the pass is given up
    pub io_retry_limit: u32,
    /// Base delay between I/O retries, scaled linearly per failure
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            io_retry_limit: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_io_retry_limit(mut self, limit: u32) -> Self {
        self.io_retry_limit = limit;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
