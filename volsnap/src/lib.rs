//! Snapshot control for volumes served by a local storage target
//!
//! An orchestrator asks for snapshots over RPC; the storage target can only
//! be driven through its line-oriented control socket. The
//! [`coordinator::SnapshotCoordinator`] sits in between: it encodes each
//! request as one command, sends it under the configured timing budget, and
//! classifies what comes back.

pub mod controller;
pub mod coordinator;
pub mod error;
pub mod inflight;
pub mod report;
pub mod rpc;
pub mod server;

#[cfg(test)]
mod test_util;

pub use coordinator::{Outcome, SnapshotCoordinator, SnapshotResult};
pub use error::SnapshotError;
pub use report::{OutputFormat, Report};
pub use rpc::{CommandStatus, RpcError, SnapshotRpcHandler};
