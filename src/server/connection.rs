//! A single live WebSocket connection record.
//!
//! Adapted from the framework's websocket connection handle: the
//! ordering-preserving `mpsc` sender is kept unchanged, but `rooms`
//! becomes a live subscription set consulted by the manager's
//! bipartite topic index, and `user_id` is read through the attached
//! [`Session`] rather than stored independently.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::Session;

/// Unique identifier for a live connection.
#[derive(Clone, Copy, Eq)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for ConnectionId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Hash for ConnectionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A live WebSocket connection: outbound channel, attached session,
/// and the set of topics it is currently subscribed to.
///
/// The manager's per-topic index and this record's own subscription
/// set are two views of the same bipartite graph; both must be kept
/// in sync on subscribe, unsubscribe, and close.
#[derive(Debug)]
pub struct WebSocketConnection {
    pub id: ConnectionId,
    pub endpoint: String,
    pub sender: mpsc::Sender<Message>,
    pub session: Session,
    pub client_ip: Option<String>,
    subscriptions: RwLock<HashSet<String>>,
}

impl WebSocketConnection {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, sender: mpsc::Sender<Message>, session: Session) -> Self {
        Self {
            id: ConnectionId::new(),
            endpoint: endpoint.into(),
            sender,
            session,
            client_ip: None,
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_client_ip(mut self, ip: String) -> Self {
        self.client_ip = Some(ip);
        self
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.user_id().is_some()
    }

    pub async fn send(&self, message: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.sender.send(message).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), mpsc::error::SendError<Message>> {
        self.send(Message::Text(text.into().into())).await
    }

    /// Add a topic to this connection's subscription set. Idempotent.
    pub fn subscribe(&self, topic: impl Into<String>) {
        self.subscriptions.write().unwrap().insert(topic.into());
    }

    /// Remove a topic from this connection's subscription set. A no-op
    /// if the connection was not subscribed.
    pub fn unsubscribe(&self, topic: &str) {
        self.subscriptions.write().unwrap().remove(topic);
    }

    /// Snapshot of currently subscribed topics.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscriptions.read().unwrap().iter().cloned().collect()
    }
}
