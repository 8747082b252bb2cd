//! Test doubles for the control channel.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use volsnap_control::{ControlChannel, ControlError, RawResponse};

type Script = Box<dyn Fn(&str) -> volsnap_control::Result<RawResponse> + Send + Sync>;

/// Records every command it is sent and answers from a script
pub struct StubChannel {
    calls: Mutex<Vec<(String, Duration)>>,
    script: Script,
    delay: Duration,
}

impl StubChannel {
    pub fn new(
        script: impl Fn(&str) -> volsnap_control::Result<RawResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
            delay: Duration::ZERO,
        }
    }

    /// Hold every reply back for `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Always answer with `line`
    pub fn replying(line: &'static str) -> Self {
        Self::new(move |_| Ok(RawResponse::from_line(line)))
    }

    /// Always fail with a refused connection
    pub fn refusing() -> Self {
        Self::new(|_| {
            Err(ControlError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )))
        })
    }

    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ControlChannel for StubChannel {
    async fn send(&self, command: &str, deadline: Duration) -> volsnap_control::Result<RawResponse> {
        self.calls.lock().push((command.to_string(), deadline));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(command)
    }
}
