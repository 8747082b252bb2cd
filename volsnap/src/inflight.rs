//! Tracking of snapshot requests currently in flight.
//!
//! Requests for the same volume and snapshot are neither serialised nor
//! deduplicated: the storage target arbitrates conflicting operations, and
//! serialising them is the orchestrator's job. Overlaps are only made
//! visible, so they show up in the logs instead of racing silently.

use std::collections::HashMap;

use parking_lot::Mutex;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct InflightRequests {
    pending: Mutex<HashMap<Key, usize>>,
}

impl InflightRequests {
    /// Register a request for `(volume, snapshot)`.
    ///
    /// Returns the guard that unregisters it on drop, and the number of
    /// requests for the same pair that were already pending.
    pub fn begin(&self, volume: &str, snapshot: &str) -> (InflightGuard<'_>, usize) {
        let key = (volume.to_string(), snapshot.to_string());
        let mut pending = self.pending.lock();
        let count = pending.entry(key.clone()).or_default();
        let overlapping = *count;
        *count += 1;

        (
            InflightGuard {
                requests: self,
                key,
            },
            overlapping,
        )
    }

    /// Number of requests pending for `(volume, snapshot)`
    pub fn pending(&self, volume: &str, snapshot: &str) -> usize {
        self.pending
            .lock()
            .get(&(volume.to_string(), snapshot.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn finish(&self, key: &Key) {
        let mut pending = self.pending.lock();
        if let Some(count) = pending.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                pending.remove(key);
            }
        }
    }
}

#[derive(Debug)]
pub struct InflightGuard<'a> {
    requests: &'a InflightRequests,
    key: Key,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.requests.finish(&self.key);
    }
}
