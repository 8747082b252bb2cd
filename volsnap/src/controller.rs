use std::{
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use anyhow::Context;
use serde::Deserialize;
use tokio::sync::broadcast;
use volsnap_common::{Signal, config::SnapshotTimeouts, internal, logging, tracing};
use volsnap_control::{ControlChannel, ControlClient, DEFAULT_CONTROL_SOCKET, TimingBudget};

use crate::{
    coordinator::SnapshotCoordinator,
    rpc::SnapshotRpcHandler,
    server::{RpcConfig, RpcServer},
};

/// Where and how to reach the storage target's control socket
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Keep one connection open and serialise exchanges on it
    #[serde(default)]
    pub persistent: bool,
}

fn default_socket_path() -> String {
    DEFAULT_CONTROL_SOCKET.to_string()
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            persistent: false,
        }
    }
}

impl ControlConfig {
    #[must_use]
    pub fn client(&self) -> ControlClient {
        let client = ControlClient::new(self.socket_path.clone());
        if self.persistent {
            client.with_persistent_connection()
        } else {
            client
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Volsnap {
    #[serde(default)]
    control: ControlConfig,
    #[serde(alias = "budget", default)]
    timeouts: SnapshotTimeouts,
    #[serde(default)]
    rpc: RpcConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VOLSNAP_CONFIG";

/// Searched in order when [`CONFIG_ENV`] is unset
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = [
    "./volsnap.config.ron",
    "/etc/volsnap/volsnap.config.ron",
];

/// Pick the configuration file.
///
/// A path named by the environment must exist; it is never silently
/// replaced by one of the `candidates`, which are otherwise tried in order.
fn locate_config<P: AsRef<Path>>(
    env_value: Option<&str>,
    candidates: &[P],
) -> anyhow::Result<PathBuf> {
    if let Some(env_path) = env_value {
        let path = PathBuf::from(env_path);
        anyhow::ensure!(
            path.exists(),
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
        return Ok(path);
    }

    if let Some(path) = candidates.iter().map(P::as_ref).find(|path| path.exists()) {
        return Ok(path.to_path_buf());
    }

    let tried = candidates
        .iter()
        .map(|path| format!("  - {}", path.as_ref().display()))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{tried}"
    )
}

/// Wait for ctrl-c or SIGTERM, then ask the servers to drain.
///
/// Keeps waiting afterwards so the servers can finish their in-flight
/// requests; a second ctrl-c cuts them off.
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    let signalled = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                internal!(
                    level = INFO,
                    "CTRL+C entered, draining -- enter it again to force shutdown"
                );
            }
            _ = terminate.recv() => {
                internal!(level = INFO, "Terminate Signal received, draining");
            }
        }
    };

    let forced = async {
        let _ = tokio::signal::ctrl_c().await;
        internal!(level = WARN, "Forcing shutdown with requests in flight");
    };

    shutdown_on(signalled, &SHUTDOWN_BROADCAST, forced).await
}

async fn shutdown_on(
    signalled: impl Future<Output = ()>,
    sender: &broadcast::Sender<Signal>,
    forced: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    signalled.await;

    sender
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    forced.await;
    Ok(())
}

/// Serve until the server has drained, or until `shutdown` resolves first
async fn drive(
    server: RpcServer,
    sender: &broadcast::Sender<Signal>,
    shutdown: impl Future<Output = anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let signals = sender.subscribe();

    tokio::select! {
        r = server.serve(signals) => {
            r.map_err(anyhow::Error::from)
        }
        r = shutdown => {
            r
        }
    }
}

impl Volsnap {
    /// Load the configuration from the file named by [`CONFIG_ENV`], or else
    /// the first of [`DEFAULT_CONFIG_PATHS`] that exists
    ///
    /// # Errors
    ///
    /// Returns an error if no file is found, or it cannot be read or parsed.
    pub fn from_environment() -> anyhow::Result<Self> {
        let env_value = std::env::var(CONFIG_ENV).ok();
        let path = locate_config(env_value.as_deref(), &DEFAULT_CONFIG_PATHS)?;
        Self::from_file(&path)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        ron::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    #[must_use]
    pub const fn control(&self) -> &ControlConfig {
        &self.control
    }

    #[must_use]
    pub const fn timeouts(&self) -> SnapshotTimeouts {
        self.timeouts
    }

    #[must_use]
    pub const fn rpc(&self) -> &RpcConfig {
        &self.rpc
    }

    /// Build the coordinator described by this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured timing budget is inconsistent.
    pub fn coordinator(&self) -> anyhow::Result<SnapshotCoordinator> {
        let budget = TimingBudget::try_from(self.timeouts)?;
        let channel: Arc<dyn ControlChannel> = Arc::new(self.control.client());
        Ok(SnapshotCoordinator::new(channel, budget))
    }

    /// Run the snapshot RPC server until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid,
    /// the RPC listener cannot be bound, or the server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let coordinator = self.coordinator()?;
        let budget = coordinator.budget();
        tracing::info!(
            socket = %self.control.socket_path,
            persistent = self.control.persistent,
            quiesce_secs = budget.quiesce_window().as_secs(),
            total_secs = budget.total_budget().as_secs(),
            "Snapshot coordinator configured"
        );

        if let Err(e) = self.control.client().check_socket_exists() {
            tracing::warn!("{e}; requests will fail until the storage target is up");
        }

        let handler = SnapshotRpcHandler::new(Arc::new(coordinator));
        let server = RpcServer::new(&self.rpc, handler).await?;

        internal!(level = INFO, "Controller running");

        let ret = drive(server, &SHUTDOWN_BROADCAST, shutdown()).await;

        internal!(level = INFO, "Shutting down...");

        ret
    }
}
