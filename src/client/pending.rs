//! The pending-request table: correlates a request's id to the
//! `oneshot` sender that will wake the caller awaiting its response.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

/// Outstanding requests awaiting a correlated response, keyed by the
/// frame id assigned at send time.
#[derive(Default)]
pub struct PendingTable {
    inner: DashMap<String, oneshot::Sender<Value>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a new pending request, returning the receiver half the
    /// caller awaits.
    pub fn insert(&self, id: String) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(id, tx);
        rx
    }

    /// Resolve a pending request with its correlated response data.
    /// A missing or already-resolved entry (duplicate response, or a
    /// caller that gave up on timeout) is silently ignored.
    pub fn resolve(&self, id: &str, data: Value) {
        if let Some((_, tx)) = self.inner.remove(id) {
            let _ = tx.send(data);
        }
    }

    /// Drop a pending entry without resolving it, e.g. after the
    /// caller's own timeout fires.
    pub fn cancel(&self, id: &str) {
        self.inner.remove(id);
    }

    /// Number of requests still awaiting a response.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every pending sender, failing all outstanding `request()`
    /// callers with a closed-channel error. Used on final shutdown.
    pub fn cancel_all(&self) {
        self.inner.clear();
    }
}
