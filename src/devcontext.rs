//! Fixed-capacity ring buffers of recent HTTP/WS/log/error events, for
//! runtime diagnostics only — never consulted or written on the
//! per-frame happy-path hot loop.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DevContextConfig;

/// One recorded diagnostic event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub detail: Option<Value>,
}

impl Event {
    fn new(summary: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            at: Utc::now(),
            summary: summary.into(),
            detail,
        }
    }
}

struct RingBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<Event>>,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, event: Event) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Four independent ring buffers: HTTP requests, WebSocket lifecycle
/// events, log lines, and errors. Wired into the connection-open/close
/// paths and the dispatcher's error paths.
pub struct DevContext {
    http: RingBuffer,
    ws: RingBuffer,
    log: RingBuffer,
    error: RingBuffer,
}

impl DevContext {
    #[must_use]
    pub fn new(config: &DevContextConfig) -> Self {
        Self {
            http: RingBuffer::new(config.http_capacity),
            ws: RingBuffer::new(config.ws_capacity),
            log: RingBuffer::new(config.log_capacity),
            error: RingBuffer::new(config.error_capacity),
        }
    }

    pub fn push_http(&self, summary: impl Into<String>, detail: Option<Value>) {
        self.http.push(Event::new(summary, detail));
    }

    pub fn push_ws(&self, summary: impl Into<String>, detail: Option<Value>) {
        self.ws.push(Event::new(summary, detail));
    }

    pub fn push_log(&self, summary: impl Into<String>) {
        self.log.push(Event::new(summary, None));
    }

    pub fn push_error(&self, summary: impl Into<String>, detail: Option<Value>) {
        self.error.push(Event::new(summary, detail));
    }

    #[must_use]
    pub fn http_events(&self) -> Vec<Event> {
        self.http.snapshot()
    }

    #[must_use]
    pub fn ws_events(&self) -> Vec<Event> {
        self.ws.snapshot()
    }

    #[must_use]
    pub fn log_events(&self) -> Vec<Event> {
        self.log.snapshot()
    }

    #[must_use]
    pub fn error_events(&self) -> Vec<Event> {
        self.error.snapshot()
    }
}

impl Default for DevContext {
    fn default() -> Self {
        Self::new(&DevContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entry_is_overwritten_past_capacity() {
        let config = DevContextConfig {
            http_capacity: 2,
            ws_capacity: 2,
            log_capacity: 2,
            error_capacity: 2,
        };
        let ctx = DevContext::new(&config);
        ctx.push_ws("open-1", None);
        ctx.push_ws("open-2", None);
        ctx.push_ws("open-3", None);

        let events = ctx.ws_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "open-2");
        assert_eq!(events[1].summary, "open-3");
    }

    #[test]
    fn buffers_are_independent() {
        let ctx = DevContext::default();
        ctx.push_log("something happened");
        assert_eq!(ctx.log.len(), 1);
        assert_eq!(ctx.error.len(), 0);
    }
}
