//! End-to-end test harness
//!
//! Starts a [`MockTarget`] on a control socket inside a temporary directory,
//! a [`SnapshotCoordinator`] talking to it, and the snapshot RPC server on a
//! random local port.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::broadcast,
    task::JoinHandle,
};
use volsnap::{
    SnapshotCoordinator, SnapshotRpcHandler,
    server::{RpcConfig, RpcServer},
};
use volsnap_common::Signal;
use volsnap_control::{
    ControlChannel, ControlClient, ControlServer, TimingBudget, server::CommandHandler,
};

use super::mock_target::MockTarget;

/// Budget used by the harness: short enough for a hung target to time out quickly
pub const QUIESCE_SECS: u64 = 1;
pub const TOTAL_SECS: u64 = 2;

pub struct VolsnapTestHarness {
    _temp_dir: TempDir,
    socket_path: String,
    target: Arc<MockTarget>,
    coordinator: Arc<SnapshotCoordinator>,
    rpc_addr: SocketAddr,
    target_shutdown: broadcast::Sender<Signal>,
    rpc_shutdown: broadcast::Sender<Signal>,
    target_handle: JoinHandle<()>,
    rpc_handle: JoinHandle<()>,
}

impl VolsnapTestHarness {
    /// Start the mock target and the RPC server
    ///
    /// # Errors
    ///
    /// Returns an error if either server cannot be started.
    pub async fn start(persistent: bool) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let socket_path = temp_dir
            .path()
            .join("istgt_ctl_sock")
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Temporary path is not UTF-8"))?
            .to_string();

        let target = Arc::new(MockTarget::default());
        let (target_shutdown, target_rx) = broadcast::channel(1);
        let server = ControlServer::new(
            socket_path.clone(),
            Arc::clone(&target) as Arc<dyn CommandHandler>,
        );
        let target_handle = tokio::spawn(async move {
            if let Err(e) = server.serve(target_rx).await {
                eprintln!("Mock target error: {e}");
            }
        });

        // Give the target time to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = ControlClient::new(socket_path.clone());
        let client = if persistent {
            client.with_persistent_connection()
        } else {
            client
        };
        let channel: Arc<dyn ControlChannel> = Arc::new(client);
        let coordinator = Arc::new(SnapshotCoordinator::new(
            channel,
            TimingBudget::from_secs(QUIESCE_SECS, TOTAL_SECS)?,
        ));

        let rpc = RpcServer::new(
            &RpcConfig {
                listen_address: "127.0.0.1:0".to_string(),
            },
            SnapshotRpcHandler::new(Arc::clone(&coordinator)),
        )
        .await?;
        let rpc_addr = rpc.local_addr()?;
        let (rpc_shutdown, rpc_rx) = broadcast::channel(1);
        let rpc_handle = tokio::spawn(async move {
            if let Err(e) = rpc.serve(rpc_rx).await {
                eprintln!("RPC server error: {e}");
            }
        });

        Ok(Self {
            _temp_dir: temp_dir,
            socket_path,
            target,
            coordinator,
            rpc_addr,
            target_shutdown,
            rpc_shutdown,
            target_handle,
            rpc_handle,
        })
    }

    pub fn coordinator(&self) -> Arc<SnapshotCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Commands the mock target has received, tokenised
    pub fn target_commands(&self) -> Vec<Vec<String>> {
        self.target.commands()
    }

    /// Take the storage target down; its socket file goes with it
    pub async fn stop_target(&self) {
        let _ = self.target_shutdown.send(Signal::Shutdown);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// POST a JSON body to the RPC server, returning the HTTP status and body
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP exchange fails.
    pub async fn post(&self, path: &str, body: &str) -> anyhow::Result<(u16, String)> {
        let request = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        self.request(&request).await
    }

    /// GET a path from the RPC server
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP exchange fails.
    pub async fn get(&self, path: &str) -> anyhow::Result<(u16, String)> {
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        self.request(&request).await
    }

    async fn request(&self, request: &str) -> anyhow::Result<(u16, String)> {
        let mut stream = TcpStream::connect(self.rpc_addr).await?;
        stream.write_all(request.as_bytes()).await?;

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await?;

        let (head, body) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| anyhow::anyhow!("Malformed HTTP response: {raw}"))?;
        let status = head
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("Missing HTTP status: {head}"))?
            .parse()?;

        Ok((status, body.to_string()))
    }

    /// Stop both servers
    pub async fn shutdown(self) {
        let _ = self.rpc_shutdown.send(Signal::Shutdown);
        let _ = self.target_shutdown.send(Signal::Shutdown);
        let _ = tokio::time::timeout(Duration::from_secs(5), self.rpc_handle).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.target_handle).await;
    }
}
