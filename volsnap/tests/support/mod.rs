//! Test support utilities for end-to-end testing
//!
//! Runs a mock storage target behind a real control socket, with the
//! snapshot RPC server in front of it, all in the test process.

pub mod harness;
pub mod mock_target;

pub use harness::VolsnapTestHarness;
