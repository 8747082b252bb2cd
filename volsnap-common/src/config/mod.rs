//! Configuration types shared by the volsnap crates.
//!
//! - [`timeouts`]: the quiesce window and total budget for snapshot operations

pub mod timeouts;

pub use timeouts::{ConfigError, SnapshotTimeouts};
