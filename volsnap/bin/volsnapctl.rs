//! Command-line utility for snapshotting volumes through the storage target's
//! control socket
//!
//! Drives the same coordinator as the RPC daemon, without the RPC hop:
//! - `volsnapctl create <VOLUME> <SNAPSHOT>`
//! - `volsnapctl delete <VOLUME> <SNAPSHOT>`
//!
//! Exit status: 0 when the storage target committed the operation, 1 when it
//! rejected it, 2 when no status was obtained.

use std::{process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use volsnap::{OutputFormat, Report, SnapshotCoordinator};
use volsnap_common::config::SnapshotTimeouts;
use volsnap_control::{ControlChannel, ControlClient, DEFAULT_CONTROL_SOCKET, TimingBudget};

/// Snapshot volumes served by the local storage target
#[derive(Parser, Debug)]
#[command(name = "volsnapctl")]
#[command(about = "Create and delete volume snapshots", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the storage target's control socket
    #[arg(short = 'c', long, default_value = DEFAULT_CONTROL_SOCKET)]
    control_socket: String,

    /// Seconds the volume's I/O may be paused while the snapshot is taken
    #[arg(long, default_value_t = SnapshotTimeouts::default().quiesce_secs)]
    quiesce_secs: u64,

    /// Upper bound in seconds for the whole operation
    #[arg(long, default_value_t = SnapshotTimeouts::default().total_secs)]
    total_secs: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take a snapshot of a volume
    Create {
        /// Volume to snapshot
        volume: String,
        /// Name of the new snapshot
        snapshot: String,
    },
    /// Destroy a snapshot of a volume
    Delete {
        /// Volume owning the snapshot
        volume: String,
        /// Snapshot to destroy
        snapshot: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let budget = TimingBudget::from_secs(cli.quiesce_secs, cli.total_secs)?;
    let client = ControlClient::new(cli.control_socket.clone());
    if let Err(e) = client.check_socket_exists() {
        eprintln!("Warning: {e}");
    }

    let channel: Arc<dyn ControlChannel> = Arc::new(client);
    let coordinator = SnapshotCoordinator::new(channel, budget);

    let result = match &cli.command {
        Commands::Create { volume, snapshot } => {
            coordinator.create_snapshot(volume, snapshot).await
        }
        Commands::Delete { volume, snapshot } => {
            coordinator.delete_snapshot(volume, snapshot).await
        }
    };

    let report = Report::new(cli.format, &result);
    println!("{}", report.output);

    if let Err(e) = &result {
        eprintln!("Error: {e}");
        if e.outcome_unknown() {
            eprintln!(
                "The storage target may still have applied the operation; check before retrying"
            );
        }
    }

    Ok(ExitCode::from(report.exit_code))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_follow_daemon_config() {
        let cli = Cli::parse_from(["volsnapctl", "create", "vol1", "snap1"]);
        let defaults = SnapshotTimeouts::default();

        assert_eq!(cli.quiesce_secs, defaults.quiesce_secs);
        assert_eq!(cli.total_secs, defaults.total_secs);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.control_socket, DEFAULT_CONTROL_SOCKET);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "volsnapctl",
            "--format",
            "json",
            "--total-secs",
            "30",
            "delete",
            "vol1",
            "snap1",
        ]);

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.total_secs, 30);
        assert!(matches!(
            cli.command,
            Commands::Delete { ref volume, ref snapshot } if volume == "vol1" && snapshot == "snap1"
        ));
    }
}
