//! Control channel for a local storage target
//!
//! The storage target (the daemon serving the volume) exposes no remote
//! interface of its own, only a line-oriented command socket. This crate:
//! - Builds the command lines for snapshot create/delete and classifies their
//!   responses ([`protocol`])
//! - Exchanges one command line for one response line over a Unix domain
//!   socket, under a deadline ([`client`])
//! - Serves the same wire format from a handler, which is what the tests use
//!   in place of a real storage target ([`server`])

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ControlChannel, ControlClient};
pub use error::{ControlError, Result};
pub use protocol::{
    Command, FAILURE_MARKER, Operation, PROTOCOL_VERSION, RawResponse, SUCCESS_MARKER, Status,
    TimingBudget,
};
pub use server::ControlServer;

/// Well-known path of the storage target's control socket
pub const DEFAULT_CONTROL_SOCKET: &str = "/var/run/istgt_ctl_sock";
