//! Timeout configuration for snapshot operations.
//!
//! Two values bound every snapshot create/delete:
//! - **Quiesce window**: how long the storage target may hold the volume's
//!   write path paused for a single attempt
//! - **Total budget**: the upper bound for the whole operation, across every
//!   participant serving the volume (e.g. replicas)
//!
//! Both values are forwarded to the storage target verbatim, and the total
//! budget is also the deadline this process applies to the control exchange.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a configuration section is internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The total budget cannot be zero; every exchange would time out.
    #[error("Invalid configuration for total_secs: must be greater than zero")]
    ZeroTotalBudget,

    /// The quiesce window must fit inside the total budget.
    #[error(
        "Invalid configuration for quiesce_secs: {quiesce_secs}s exceeds total_secs of {total_secs}s"
    )]
    QuiesceExceedsTotal { quiesce_secs: u64, total_secs: u64 },
}

/// Snapshot timing configuration, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTimeouts {
    /// Time the volume's I/O may be paused per attempt.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::quiesce_secs")]
    pub quiesce_secs: u64,

    /// Upper bound for the entire operation.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::total_secs")]
    pub total_secs: u64,
}

impl Default for SnapshotTimeouts {
    fn default() -> Self {
        Self {
            quiesce_secs: defaults::quiesce_secs(),
            total_secs: defaults::total_secs(),
        }
    }
}

impl SnapshotTimeouts {
    /// Check the invariant `total_secs >= quiesce_secs` and that the total is non-zero.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first violated constraint.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.total_secs == 0 {
            return Err(ConfigError::ZeroTotalBudget);
        }

        if self.quiesce_secs > self.total_secs {
            return Err(ConfigError::QuiesceExceedsTotal {
                quiesce_secs: self.quiesce_secs,
                total_secs: self.total_secs,
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn quiesce_window(&self) -> Duration {
        Duration::from_secs(self.quiesce_secs)
    }

    #[must_use]
    pub const fn total_budget(&self) -> Duration {
        Duration::from_secs(self.total_secs)
    }
}

mod defaults {
    pub const fn quiesce_secs() -> u64 {
        10
    }

    pub const fn total_secs() -> u64 {
        60 // sized for coordination across every replica of the volume
    }
}
