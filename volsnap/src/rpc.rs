//! Snapshot RPC handler
//!
//! Adapts the remote calls to the coordinator. Every call, whatever its
//! outcome, produces a well-formed `status` payload: the orchestrator reads
//! the `response` field of that payload to decide how to proceed, so it must
//! never be left without one. Errors are reported alongside the payload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use volsnap_control::{FAILURE_MARKER, PROTOCOL_VERSION};

use crate::{SnapshotError, coordinator::SnapshotCoordinator};

/// Encoded status object carried in every RPC response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub response: String,
}

impl CommandStatus {
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    /// The status reported when no status came back from the target
    #[must_use]
    pub fn failure() -> Self {
        Self::new(FAILURE_MARKER)
    }

    /// JSON encoding, e.g. `{"response":"OK"}`
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        // A struct holding one string always serialises
        serde_json::to_vec(self)
            .unwrap_or_else(|_| format!(r#"{{"response":"{FAILURE_MARKER}"}}"#).into_bytes())
    }
}

const fn default_version() -> u32 {
    PROTOCOL_VERSION
}

/// Request to snapshot a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCreateRequest {
    pub volume: String,
    pub snapname: String,
    /// Logged, otherwise opaque
    #[serde(default = "default_version")]
    pub version: u32,
}

/// Request to destroy a snapshot of a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDeleteRequest {
    pub volume: String,
    pub snapname: String,
    /// Logged, otherwise opaque
    #[serde(default = "default_version")]
    pub version: u32,
}

/// Response to either snapshot call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResponse {
    /// JSON encoded [`CommandStatus`]
    pub status: Vec<u8>,
}

impl From<CommandStatus> for SnapshotResponse {
    fn from(status: CommandStatus) -> Self {
        Self {
            status: status.to_json(),
        }
    }
}

/// A failed call: the payload to return anyway, and the reason
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RpcError {
    pub response: SnapshotResponse,
    #[source]
    pub error: SnapshotError,
}

impl From<SnapshotError> for RpcError {
    fn from(error: SnapshotError) -> Self {
        Self {
            response: CommandStatus::failure().into(),
            error,
        }
    }
}

/// Serves the snapshot calls from a shared coordinator
#[derive(Clone)]
pub struct SnapshotRpcHandler {
    coordinator: Arc<SnapshotCoordinator>,
}

impl SnapshotRpcHandler {
    #[must_use]
    pub const fn new(coordinator: Arc<SnapshotCoordinator>) -> Self {
        Self { coordinator }
    }

    #[must_use]
    pub fn coordinator(&self) -> &SnapshotCoordinator {
        &self.coordinator
    }

    /// # Errors
    ///
    /// Returns an [`RpcError`] carrying an `ERR` payload if the request was
    /// invalid, the control channel failed, or the budget ran out
    pub async fn snapshot_create(
        &self,
        request: SnapshotCreateRequest,
    ) -> Result<SnapshotResponse, RpcError> {
        info!(
            volume = %request.volume,
            snapname = %request.snapname,
            version = request.version,
            "Received snapshot create request"
        );

        let result = self
            .coordinator
            .create_snapshot(&request.volume, &request.snapname)
            .await?;
        Ok(result.envelope().into())
    }

    /// # Errors
    ///
    /// Returns an [`RpcError`] carrying an `ERR` payload if the request was
    /// invalid, the control channel failed, or the budget ran out
    pub async fn snapshot_delete(
        &self,
        request: SnapshotDeleteRequest,
    ) -> Result<SnapshotResponse, RpcError> {
        info!(
            volume = %request.volume,
            snapname = %request.snapname,
            version = request.version,
            "Received snapshot delete request"
        );

        let result = self
            .coordinator
            .delete_snapshot(&request.volume, &request.snapname)
            .await?;
        Ok(result.envelope().into())
    }
}
