//! Line-oriented control server
//!
//! Speaks the storage target's wire format: one command line in, one
//! response line out, repeated until the client hangs up. Used to stand in
//! for the storage target in tests and local demos.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::broadcast,
};
use tracing::{debug, error, info, trace};
use volsnap_common::Signal;

use crate::{ControlError, Result};

/// Handler trait for processing control command lines
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle one tokenised command line and return the response line
    async fn handle_command(&self, tokens: Vec<String>) -> String;
}

/// Control server bound to a Unix domain socket
pub struct ControlServer {
    socket_path: String,
    handler: Arc<dyn CommandHandler>,
}

impl ControlServer {
    #[must_use]
    pub fn new(socket_path: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
        }
    }

    /// Serve connections until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process is already serving the socket
    /// - The socket cannot be bound
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> Result<()> {
        let socket_path = Path::new(&self.socket_path);
        if socket_path.exists() {
            if UnixStream::connect(socket_path).await.is_ok() {
                return Err(ControlError::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!(
                        "Socket already in use by running instance: {}",
                        self.socket_path
                    ),
                )));
            }
            info!("Removing stale socket file: {}", self.socket_path);
            tokio::fs::remove_file(socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            let metadata = tokio::fs::metadata(&self.socket_path).await?;
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            tokio::fs::set_permissions(&self.socket_path, perms).await?;
        }
        info!("Control server listening on: {}", self.socket_path);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let handler = Arc::clone(&self.handler);
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, handler).await {
                                    error!("Error handling control connection: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting control connection: {e}");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            info!("Control server shutting down");
                        }
                        Err(e) => {
                            error!("Control server shutdown channel error: {e}");
                        }
                    }
                    break;
                }
            }
        }

        if socket_path.exists() {
            debug!("Removing socket file: {}", self.socket_path);
            let _ = tokio::fs::remove_file(socket_path).await;
        }

        Ok(())
    }

    async fn handle_connection(stream: UnixStream, handler: Arc<dyn CommandHandler>) -> Result<()> {
        let mut stream = BufReader::new(stream);
        let mut line = String::new();

        loop {
            line.clear();
            if stream.read_line(&mut line).await? == 0 {
                trace!("Control client disconnected");
                return Ok(());
            }

            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            trace!("Received command: {tokens:?}");

            let response = handler.handle_command(tokens).await;
            trace!("Sending response: {response}");

            let writer = stream.get_mut();
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
            writer.flush().await?;
        }
    }
}
