//! Snapshot control coordinator.
//!
//! Turns a snapshot request into exactly one command, exactly one control
//! channel exchange and one [`SnapshotResult`]. The storage target runs the
//! quiesce → snapshot → resume sequence on its side; this component only
//! sends the command and observes the terminal status:
//!
//! ```text
//! Idle → Requested → (Quiescing → Snapshotting → Resumed) → Committed | Aborted
//! ```
//!
//! A target that hangs mid-sequence is cut off by the total budget and
//! surfaces as [`SnapshotError::Timeout`], never as an `ERR` status.
//!
//! Concurrent requests for different volumes are independent. Concurrent
//! requests for the same volume and snapshot are passed through as they are;
//! callers must serialise those themselves.

use std::sync::Arc;

use tracing::{debug, info, warn};
use volsnap_control::{Command, ControlChannel, Operation, Status, TimingBudget};

use crate::{SnapshotError, inflight::InflightRequests, rpc::CommandStatus};

/// Terminal state of a snapshot operation as reported by the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    Aborted,
}

/// Result of one snapshot request that reached the storage target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResult {
    operation: Operation,
    volume: String,
    snapshot: String,
    status: Status,
}

impl SnapshotResult {
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    #[must_use]
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        if self.status.is_ok() {
            Outcome::Committed
        } else {
            Outcome::Aborted
        }
    }

    /// Returns `true` if the target explicitly declined the operation
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        !self.status.is_ok()
    }

    /// The machine-readable status returned to RPC callers
    #[must_use]
    pub fn envelope(&self) -> CommandStatus {
        CommandStatus::new(self.status.response())
    }
}

/// Drives snapshot commands through a control channel under a timing budget
pub struct SnapshotCoordinator {
    channel: Arc<dyn ControlChannel>,
    budget: TimingBudget,
    inflight: InflightRequests,
}

impl SnapshotCoordinator {
    #[must_use]
    pub fn new(channel: Arc<dyn ControlChannel>, budget: TimingBudget) -> Self {
        Self {
            channel,
            budget,
            inflight: InflightRequests::default(),
        }
    }

    #[must_use]
    pub const fn budget(&self) -> TimingBudget {
        self.budget
    }

    /// Ask the storage target to snapshot `volume` as `snapshot`.
    ///
    /// The target pauses the volume's writes for up to the quiesce window
    /// while the snapshot is taken.
    ///
    /// # Errors
    ///
    /// See [`SnapshotError`]. A rejection by the target is not an error.
    pub async fn create_snapshot(
        &self,
        volume: &str,
        snapshot: &str,
    ) -> Result<SnapshotResult, SnapshotError> {
        self.execute(Operation::Create, volume, snapshot).await
    }

    /// Ask the storage target to destroy `snapshot` of `volume`.
    ///
    /// # Errors
    ///
    /// See [`SnapshotError`]. A rejection by the target is not an error.
    pub async fn delete_snapshot(
        &self,
        volume: &str,
        snapshot: &str,
    ) -> Result<SnapshotResult, SnapshotError> {
        self.execute(Operation::Delete, volume, snapshot).await
    }

    async fn execute(
        &self,
        operation: Operation,
        volume: &str,
        snapshot: &str,
    ) -> Result<SnapshotResult, SnapshotError> {
        let command = Command::new(operation, volume, snapshot, self.budget)?;

        let (_inflight, overlapping) = self.inflight.begin(volume, snapshot);
        if overlapping > 0 {
            warn!(
                %operation,
                volume,
                snapshot,
                overlapping,
                "Concurrent requests for the same snapshot; the storage target will arbitrate"
            );
        }

        debug!(%operation, volume, snapshot, "Sending snapshot command");
        let response = self
            .channel
            .send(&command.encode(), self.budget.total_budget())
            .await
            .inspect_err(|e| warn!(%operation, volume, snapshot, "Snapshot command failed: {e}"))?;

        if let Some(echoed) = response.echoed_operation().filter(|echoed| *echoed != operation) {
            warn!(%operation, %echoed, %response, "Storage target echoed a different verb");
        }

        let status = response.status();
        match &status {
            Status::Ok => info!(%operation, volume, snapshot, "Snapshot operation committed"),
            Status::Err(text) => warn!(
                %operation,
                volume,
                snapshot,
                status = %text,
                "Snapshot operation rejected by storage target"
            ),
        }

        Ok(SnapshotResult {
            operation,
            volume: volume.to_string(),
            snapshot: snapshot.to_string(),
            status,
        })
    }
}
