//! Control protocol types and text encoding
//!
//! A request is a single line of whitespace separated tokens:
//!
//! ```text
//! <VERB> <volume> <snapshot> <quiesce_secs> <total_secs>
//! ```
//!
//! The response is a single line as well. Its second token is the status word;
//! the first one echoes the verb. A response without a second token is a
//! failure.

use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};

use volsnap_common::config::SnapshotTimeouts;

use crate::{ControlError, Result};

/// Current RPC protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Status word the storage target answers with on success
pub const SUCCESS_MARKER: &str = "OK";

/// Status text reported when the response carries no status word
pub const FAILURE_MARKER: &str = "ERR";

/// Snapshot operation kinds understood by the storage target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Delete,
}

impl Operation {
    /// The verb token that starts the command line
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Create => "SNAPCREATE",
            Self::Delete => "SNAPDESTROY",
        }
    }

    /// Parse a verb token, case-sensitively
    #[must_use]
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "SNAPCREATE" => Some(Self::Create),
            "SNAPDESTROY" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Time bounds for one snapshot operation.
///
/// Invariant: `total_budget >= quiesce_window` and `total_budget` is at least
/// one whole second, so the rendered values always satisfy the same ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingBudget {
    quiesce_window: Duration,
    total_budget: Duration,
}

impl TimingBudget {
    /// Build a budget from whole seconds
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidBudget`] if `total_secs` is zero or
    /// smaller than `quiesce_secs`
    pub fn from_secs(quiesce_secs: u64, total_secs: u64) -> Result<Self> {
        Self::try_from(SnapshotTimeouts {
            quiesce_secs,
            total_secs,
        })
    }

    #[must_use]
    pub const fn quiesce_window(&self) -> Duration {
        self.quiesce_window
    }

    #[must_use]
    pub const fn total_budget(&self) -> Duration {
        self.total_budget
    }
}

impl Default for TimingBudget {
    fn default() -> Self {
        let timeouts = SnapshotTimeouts::default();
        Self {
            quiesce_window: timeouts.quiesce_window(),
            total_budget: timeouts.total_budget(),
        }
    }
}

impl TryFrom<SnapshotTimeouts> for TimingBudget {
    type Error = ControlError;

    fn try_from(timeouts: SnapshotTimeouts) -> Result<Self> {
        timeouts.validate()?;

        Ok(Self {
            quiesce_window: timeouts.quiesce_window(),
            total_budget: timeouts.total_budget(),
        })
    }
}

impl From<TimingBudget> for SnapshotTimeouts {
    fn from(budget: TimingBudget) -> Self {
        Self {
            quiesce_secs: budget.quiesce_window.as_secs(),
            total_secs: budget.total_budget.as_secs(),
        }
    }
}

/// Reject identifiers the positional wire format cannot carry unambiguously.
///
/// The line has no quoting, so any whitespace would split the identifier into
/// several tokens, and a control character could end the line early.
fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ControlError::InvalidArgument(format!("{field} is required")));
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ControlError::InvalidArgument(format!(
            "{field} must not contain whitespace or control characters: {value:?}"
        )));
    }

    Ok(())
}

/// A fully validated snapshot command.
///
/// Equal commands always encode to the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    operation: Operation,
    volume: String,
    snapshot: String,
    budget: TimingBudget,
}

impl Command {
    /// Validate the identifiers and build a command
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidArgument`] if either identifier is
    /// empty or contains whitespace or control characters
    pub fn new(
        operation: Operation,
        volume: impl Into<String>,
        snapshot: impl Into<String>,
        budget: TimingBudget,
    ) -> Result<Self> {
        let volume = volume.into();
        let snapshot = snapshot.into();

        validate_identifier("volume", &volume)?;
        validate_identifier("snapshot", &snapshot)?;

        Ok(Self {
            operation,
            volume,
            snapshot,
            budget,
        })
    }

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
    pub const fn budget(&self) -> TimingBudget {
        self.budget
    }

    /// The wire line, without its terminator
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.operation.verb(),
            self.volume,
            self.snapshot,
            self.budget.quiesce_window.as_secs(),
            self.budget.total_budget.as_secs()
        )
    }
}

/// Classification of a response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The storage target committed the operation
    Ok,
    /// Anything else, with the verbatim status text
    Err(String),
}

impl Status {
    /// Classify a tokenised response.
    ///
    /// The status word lives at index 1. Fewer than two tokens is a degraded
    /// response and classifies as [`FAILURE_MARKER`]; no token past index 1 is
    /// ever consulted.
    #[must_use]
    pub fn decode<S: AsRef<str>>(tokens: &[S]) -> Self {
        match tokens.get(1).map(S::as_ref) {
            Some(SUCCESS_MARKER) => Self::Ok,
            Some(text) => Self::Err(text.to_string()),
            None => Self::Err(FAILURE_MARKER.to_string()),
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The text reported back to RPC callers
    #[must_use]
    pub fn response(&self) -> &str {
        match self {
            Self::Ok => SUCCESS_MARKER,
            Self::Err(text) => text,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.response())
    }
}

/// One response line, split on whitespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    tokens: Vec<String>,
}

impl RawResponse {
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        Self {
            tokens: line.split_whitespace().map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::decode(&self.tokens)
    }

    /// The operation named by the first token, if it is a known verb
    #[must_use]
    pub fn echoed_operation(&self) -> Option<Operation> {
        self.tokens.first().and_then(|verb| Operation::from_verb(verb))
    }
}

impl From<Vec<String>> for RawResponse {
    fn from(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl Display for RawResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}
