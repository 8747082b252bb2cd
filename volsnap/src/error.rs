//! Error types for snapshot coordination.
//!
//! A snapshot request ends in one of four ways. Three are errors:
//! [`SnapshotError::InvalidArgument`], [`SnapshotError::Transport`] and
//! [`SnapshotError::Timeout`]. The fourth, the storage target explicitly
//! rejecting the operation, is an ordinary result carrying an `ERR` status
//! (see [`crate::coordinator::SnapshotResult::is_rejected`]).
//!
//! None of them is retried here. A timed out create in particular may still
//! have completed on the target, so retry policy belongs to the caller.

use std::time::Duration;

use thiserror::Error;
use volsnap_control::ControlError;

/// Errors that terminate a snapshot request without a status from the target.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The request was rejected locally; nothing was sent to the target.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The control channel could not be reached or the exchange failed.
    #[error("Transport error: {0}")]
    Transport(#[source] ControlError),

    /// The exchange did not complete within the total budget.
    #[error("Snapshot operation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl SnapshotError {
    /// Returns `true` if the request never reached the control channel.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` if the target may have acted on the request anyway.
    ///
    /// After a timeout, or a failure once the command may have been written,
    /// the caller should check the snapshot's state rather than retry blindly.
    #[must_use]
    pub const fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<ControlError> for SnapshotError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::InvalidArgument(reason) => Self::InvalidArgument(reason),
            ControlError::InvalidBudget(reason) => Self::InvalidArgument(reason.to_string()),
            ControlError::Timeout(deadline) => Self::Timeout(deadline),
            err => Self::Transport(err),
        }
    }
}
