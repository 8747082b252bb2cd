//! What the operator CLI prints for a snapshot request, and how it exits

use clap::ValueEnum;

use crate::{CommandStatus, SnapshotError, SnapshotResult};

/// Output format of `volsnapctl`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `OK` or `ERR <text>`
    #[default]
    Text,
    /// The status object, e.g. `{"response":"OK"}`
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The line written to stdout
    pub output: String,
    pub exit_code: u8,
}

impl Report {
    /// The storage target committed the operation
    pub const COMMITTED: u8 = 0;
    /// The storage target rejected the operation
    pub const REJECTED: u8 = 1;
    /// No status was obtained from the storage target
    pub const FAILED: u8 = 2;

    #[must_use]
    pub fn new(format: OutputFormat, result: &Result<SnapshotResult, SnapshotError>) -> Self {
        let exit_code = match result {
            Ok(result) if !result.is_rejected() => Self::COMMITTED,
            Ok(_) => Self::REJECTED,
            Err(_) => Self::FAILED,
        };

        let output = match (format, result) {
            (OutputFormat::Json, Ok(result)) => json(&result.envelope()),
            (OutputFormat::Json, Err(_)) => json(&CommandStatus::failure()),
            (OutputFormat::Text, Ok(result)) if !result.is_rejected() => "OK".to_string(),
            (OutputFormat::Text, Ok(result)) => format!("ERR {}", result.status()),
            (OutputFormat::Text, Err(_)) => "ERR".to_string(),
        };

        Self { output, exit_code }
    }
}

fn json(status: &CommandStatus) -> String {
    String::from_utf8_lossy(&status.to_json()).into_owned()
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use pretty_assertions::assert_eq;
    use volsnap_control::{ControlChannel, ControlError, TimingBudget};

    use super::*;
    use crate::{SnapshotCoordinator, test_util::StubChannel};

    async fn create(reply: &'static str) -> Result<SnapshotResult, SnapshotError> {
        SnapshotCoordinator::new(
            Arc::new(StubChannel::replying(reply)) as Arc<dyn ControlChannel>,
            TimingBudget::default(),
        )
        .create_snapshot("vol1", "snap1")
        .await
    }

    #[tokio::test]
    async fn test_committed() {
        let result = create("SNAPCREATE OK vol1 snap1").await;

        assert_eq!(
            Report::new(OutputFormat::Text, &result),
            Report {
                output: "OK".to_string(),
                exit_code: Report::COMMITTED,
            }
        );
        assert_eq!(
            Report::new(OutputFormat::Json, &result),
            Report {
                output: r#"{"response":"OK"}"#.to_string(),
                exit_code: Report::COMMITTED,
            }
        );
    }

    #[tokio::test]
    async fn test_rejected() {
        let result = create("SNAPCREATE ERR_SNAP_EXISTS").await;

        assert_eq!(
            Report::new(OutputFormat::Text, &result),
            Report {
                output: "ERR ERR_SNAP_EXISTS".to_string(),
                exit_code: Report::REJECTED,
            }
        );
        assert_eq!(
            Report::new(OutputFormat::Json, &result),
            Report {
                output: r#"{"response":"ERR_SNAP_EXISTS"}"#.to_string(),
                exit_code: Report::REJECTED,
            }
        );
    }

    #[tokio::test]
    async fn test_single_token_reply_is_rejected() {
        let result = create("TIMEOUT").await;

        let report = Report::new(OutputFormat::Text, &result);
        assert_eq!(report.output, "ERR ERR");
        assert_eq!(report.exit_code, Report::REJECTED);
    }

    #[test]
    fn test_every_error_kind_fails() {
        let errors = [
            SnapshotError::InvalidArgument("volume is required".to_string()),
            SnapshotError::Transport(ControlError::ConnectionClosed),
            SnapshotError::Timeout(Duration::from_secs(60)),
        ];

        for error in errors {
            let result = Err(error);
            assert_eq!(
                Report::new(OutputFormat::Text, &result),
                Report {
                    output: "ERR".to_string(),
                    exit_code: Report::FAILED,
                }
            );
            assert_eq!(
                Report::new(OutputFormat::Json, &result),
                Report {
                    output: r#"{"response":"ERR"}"#.to_string(),
                    exit_code: Report::FAILED,
                }
            );
        }
    }
}
