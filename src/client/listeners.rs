//! The listener registry: callbacks registered against a path pattern,
//! invoked for every inbound frame with no correlation id (broadcasts
//! and topic events) whose `url` matches.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::frame::Frame;
use crate::path::Pattern;

/// A registered listener: the compiled pattern it matches against, and
/// the callback to run with the matched frame and its captured params.
type Listener = (Pattern, Arc<dyn Fn(&Frame, std::collections::HashMap<String, String>) + Send + Sync>);

/// Holds every registered listener for one client. Matching is
/// first-registered-first-run, same as the server's route table.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register `callback` to run whenever an inbound broadcast or
    /// event's pathname matches `pattern`.
    pub async fn add(
        &self,
        pattern: &str,
        callback: impl Fn(&Frame, std::collections::HashMap<String, String>) + Send + Sync + 'static,
    ) {
        let compiled = Pattern::compile(pattern);
        self.listeners.write().await.push((compiled, Arc::new(callback)));
    }

    /// Run every listener whose pattern matches `pathname`, in
    /// registration order.
    pub async fn dispatch(&self, pathname: &str, frame: &Frame) {
        let listeners = self.listeners.read().await;
        for (pattern, callback) in listeners.iter() {
            if let Some(params) = pattern.matches(pathname) {
                callback(frame, params);
            }
        }
    }
}
