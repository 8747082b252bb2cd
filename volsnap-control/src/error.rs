//! Error types for control operations

use std::time::Duration;

use thiserror::Error;
use volsnap_common::config::ConfigError;

/// Errors that can occur during control operations
#[derive(Debug, Error)]
pub enum ControlError {
    /// A volume or snapshot identifier cannot be encoded; nothing was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The timing budget violates `total >= quiesce`
    #[error("Invalid timing budget: {0}")]
    InvalidBudget(#[from] ConfigError),

    /// I/O error communicating with the control socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed before a full response line arrived
    #[error("Connection closed")]
    ConnectionClosed,

    /// Response line exceeded the maximum accepted length
    #[error("Response too large: exceeds {0} bytes")]
    ResponseTooLarge(usize),

    /// The exchange did not complete within the deadline
    #[error("Request timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Control socket path is invalid
    #[error("Invalid socket path: {0}")]
    InvalidSocketPath(String),
}

impl ControlError {
    /// Returns `true` if the exchange hit its deadline
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` if the request was rejected before anything was sent
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidBudget(_))
    }

    /// Returns `true` if the exchange failed below the protocol level
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::ResponseTooLarge(_)
                | Self::InvalidSocketPath(_)
        )
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
