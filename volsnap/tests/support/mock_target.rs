//! Mock storage target for end-to-end tests
//!
//! Answers snapshot commands the way the real target does, echoing the verb
//! before the status word. The snapshot name picks the behaviour:
//!
//! - `exists` - rejected with `ERR_SNAP_EXISTS`
//! - `short` - a single-token reply
//! - `echo` - rejected with `ERR_<volume>`, to tell concurrent replies apart
//! - `slow*` - answers only after [`SLOW_REPLY`]
//! - anything else - `OK`

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use volsnap_control::server::CommandHandler;

/// How long a `slow*` snapshot takes to answer
pub const SLOW_REPLY: Duration = Duration::from_secs(3);

#[derive(Default)]
pub struct MockTarget {
    commands: Mutex<Vec<Vec<String>>>,
}

impl MockTarget {
    /// Every command line received so far, tokenised
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandHandler for MockTarget {
    async fn handle_command(&self, tokens: Vec<String>) -> String {
        self.commands.lock().push(tokens.clone());

        let [verb, volume, snapshot, _, _] = tokens.as_slice() else {
            return "ERR".to_string();
        };

        if snapshot.starts_with("slow") {
            tokio::time::sleep(SLOW_REPLY).await;
        }

        match snapshot.as_str() {
            "exists" => format!("{verb} ERR_SNAP_EXISTS {volume} {snapshot}"),
            "short" => "TIMEOUT".to_string(),
            "echo" => format!("{verb} ERR_{volume}"),
            _ => format!("{verb} OK {volume} {snapshot}"),
        }
    }
}
