//! Client for the storage target's control socket

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::UnixStream,
    sync::Mutex,
};
use tracing::{debug, trace};
use volsnap_common::{incoming, outgoing};

use crate::{ControlError, RawResponse, Result};

/// Longest response line accepted, excluding the terminator
pub const MAX_RESPONSE_LEN: usize = 64 * 1024;

/// One command line in, one tokenised response line out.
///
/// Implementations perform no retries. An `ERR` status is a successful
/// exchange; only transport failures and the deadline produce errors.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Send `command` (without terminator) and return the response tokens
    ///
    /// # Errors
    ///
    /// - [`ControlError::Timeout`] if the exchange outlives `deadline`
    /// - [`ControlError::Io`], [`ControlError::ConnectionClosed`] or
    ///   [`ControlError::ResponseTooLarge`] if the exchange failed
    async fn send(&self, command: &str, deadline: Duration) -> Result<RawResponse>;
}

type SharedStream = Arc<Mutex<Option<BufReader<UnixStream>>>>;

/// Client for the storage target's line-oriented control socket
pub struct ControlClient {
    socket_path: String,
    /// Optional shared connection; exchanges on it are serialised by the mutex
    persistent_connection: Option<SharedStream>,
}

impl ControlClient {
    /// Create a new control client with the given socket path
    #[must_use]
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            persistent_connection: None,
        }
    }

    /// Reuse a single connection across requests instead of connecting per request
    ///
    /// Exchanges on the shared connection are serialised so that command and
    /// response lines of concurrent requests never interleave. A connection
    /// that fails, or that is abandoned at the deadline, is discarded and the
    /// next request connects afresh. The failed request itself is not retried.
    #[must_use]
    pub fn with_persistent_connection(mut self) -> Self {
        self.persistent_connection = Some(Arc::new(Mutex::new(None)));
        self
    }

    #[must_use]
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Check the control socket exists
    ///
    /// # Errors
    ///
    /// Returns an error if the socket file doesn't exist
    pub fn check_socket_exists(&self) -> Result<()> {
        if !Path::new(&self.socket_path).exists() {
            return Err(ControlError::InvalidSocketPath(format!(
                "Socket does not exist: {}",
                self.socket_path
            )));
        }
        Ok(())
    }

    async fn connect(&self) -> Result<BufReader<UnixStream>> {
        debug!("Connecting to control socket: {}", self.socket_path);
        let stream = UnixStream::connect(&self.socket_path).await?;
        Ok(BufReader::new(stream))
    }

    async fn send_internal(&self, command: &str) -> Result<RawResponse> {
        if let Some(persistent) = &self.persistent_connection {
            self.send_persistent(command, persistent).await
        } else {
            let mut stream = self.connect().await?;
            let (response, _) = exchange(&mut stream, command).await?;
            Ok(response)
        }
    }

    async fn send_persistent(
        &self,
        command: &str,
        persistent: &SharedStream,
    ) -> Result<RawResponse> {
        let mut guard = persistent.lock().await;

        // Taken out for the duration of the exchange: if this future is dropped
        // mid-exchange the stream goes with it, so a late response can never be
        // read by the next request.
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let (response, reusable) = exchange(&mut stream, command).await?;
        if reusable {
            *guard = Some(stream);
        } else {
            trace!("Control connection closed by peer, discarding");
        }

        Ok(response)
    }
}

#[async_trait]
impl ControlChannel for ControlClient {
    async fn send(&self, command: &str, deadline: Duration) -> Result<RawResponse> {
        tokio::time::timeout(deadline, self.send_internal(command))
            .await
            .map_err(|_| ControlError::Timeout(deadline))?
    }
}

/// Write one command line and read one response line.
///
/// Returns the response and whether the stream is still usable, i.e. the
/// line was properly terminated rather than cut off by EOF.
async fn exchange<S>(stream: &mut BufReader<S>, command: &str) -> Result<(RawResponse, bool)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    outgoing!(level = DEBUG, "{command}");

    let writer = stream.get_mut();
    writer.write_all(command.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;

    let mut buf = Vec::new();
    let read = (&mut *stream)
        .take(MAX_RESPONSE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Err(ControlError::ConnectionClosed);
    }

    let (line, terminated) = match buf.strip_suffix(b"\n") {
        Some(line) => (line, true),
        None => (buf.as_slice(), false),
    };

    if line.len() > MAX_RESPONSE_LEN {
        return Err(ControlError::ResponseTooLarge(MAX_RESPONSE_LEN));
    }

    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    incoming!(level = DEBUG, "{line}");

    Ok((RawResponse::from_line(line), terminated))
}
