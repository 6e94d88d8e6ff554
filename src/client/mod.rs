//! The reconnecting client runtime: connects to a `duplexio` server
//! endpoint, queues outbound frames while disconnected, correlates
//! responses to pending requests by id, and dispatches unsolicited
//! inbound frames (broadcasts, topic events) to registered listeners.
//!
//! Grounded on the same `tokio-tungstenite` + `futures-util` idiom the
//! server side uses for its socket loop, generalized with the
//! reconnect/backoff, outbound-queue, and correlation-table machinery
//! a long-lived client needs that a single accepted connection doesn't.

mod listeners;
mod pending;
mod runtime;

pub use runtime::{Client, ClientState};
