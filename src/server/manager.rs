//! The per-endpoint connection set, topic subscription index,
//! broadcaster, and dead-connection reaper.
//!
//! Grounded on the same single-`RwLock`-per-manager shape the
//! framework's websocket handler uses for its connection registry,
//! generalised here to also own the topic → connection bipartite
//! index described by the connection lifecycle rules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::frame::{Frame, Method};

use super::connection::{ConnectionId, WebSocketConnection};

/// Owns one endpoint's live-connection set and topic subscription
/// index. Reaping of dead connections is amortised into every
/// broadcast, topic event, and close rather than run on a timer.
#[derive(Default)]
pub struct EndpointManager {
    connections: RwLock<HashMap<ConnectionId, Arc<WebSocketConnection>>>,
    topics: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl EndpointManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection.
    pub async fn add_connection(&self, connection: Arc<WebSocketConnection>) {
        self.connections.write().await.insert(connection.id, connection);
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    #[must_use]
    pub async fn get(&self, id: ConnectionId) -> Option<Arc<WebSocketConnection>> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Subscribe a connection to a topic. Idempotent on both sides of
    /// the bipartite index.
    pub async fn subscribe(&self, id: ConnectionId, topic: impl Into<String>) {
        let topic = topic.into();
        if let Some(conn) = self.connections.read().await.get(&id) {
            conn.subscribe(&topic);
        }
        self.topics.write().await.entry(topic).or_default().insert(id);
    }

    /// Unsubscribe a connection from a topic. A no-op if absent.
    pub async fn unsubscribe(&self, id: ConnectionId, topic: &str) {
        if let Some(conn) = self.connections.read().await.get(&id) {
            conn.unsubscribe(topic);
        }
        if let Some(bucket) = self.topics.write().await.get_mut(topic) {
            bucket.remove(&id);
        }
    }

    /// Remove a connection entirely: drop it from the live set and
    /// every topic bucket it belonged to.
    ///
    /// Returns the removed connection's attached user id, if any, for
    /// the caller to fire a `connection-closed` event with.
    pub async fn close(&self, id: ConnectionId) -> Option<String> {
        let removed = self.connections.write().await.remove(&id);
        let mut topics = self.topics.write().await;
        for bucket in topics.values_mut() {
            bucket.remove(&id);
        }
        topics.retain(|_, bucket| !bucket.is_empty());
        removed.and_then(|conn| conn.session.user_id())
    }

    /// Fan a frame out to every live connection, reaping any whose
    /// send fails.
    pub async fn broadcast(&self, url: impl Into<String>, data: Option<Value>, method: Option<Method>) {
        let frame = Frame::broadcast(url, data, method);
        let Ok(text) = frame.to_json() else {
            tracing::debug!("failed to serialize broadcast frame");
            return;
        };
        let targets: Vec<_> = self.connections.read().await.values().cloned().collect();
        let mut dead = Vec::new();
        for conn in targets {
            if conn.send(Message::Text(text.clone().into())).await.is_err() {
                tracing::debug!(connection = %conn.id, "broadcast send failed, marking dead");
                dead.push(conn.id);
            }
        }
        for id in dead {
            self.close(id).await;
        }
    }

    /// Fan a frame out only to connections subscribed to `topic`.
    pub async fn emit_event(&self, topic: &str, data: Option<Value>) {
        let frame = Frame::broadcast(topic.to_string(), data, Some(Method::Post));
        let Ok(text) = frame.to_json() else {
            tracing::debug!("failed to serialize event frame");
            return;
        };
        let members: Vec<ConnectionId> = self
            .topics
            .read()
            .await
            .get(topic)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default();

        let mut dead = Vec::new();
        for id in members {
            let Some(conn) = self.connections.read().await.get(&id).cloned() else {
                continue;
            };
            if conn.send(Message::Text(text.clone().into())).await.is_err() {
                tracing::debug!(connection = %id, topic, "event send failed, marking dead");
                dead.push(id);
            }
        }
        for id in dead {
            self.close(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use tokio::sync::mpsc;

    fn test_connection(endpoint: &str) -> (Arc<WebSocketConnection>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(32);
        let sessions = SessionStore::new();
        let (session, _) = sessions.get_or_create(None);
        (Arc::new(WebSocketConnection::new(endpoint, tx, session)), rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_all_live_connections() {
        let manager = EndpointManager::new();
        let (conn_a, mut rx_a) = test_connection("ws");
        let (conn_b, mut rx_b) = test_connection("ws");
        manager.add_connection(conn_a).await;
        manager.add_connection(conn_b).await;

        manager.broadcast("/notice", Some(serde_json::json!({"n": 1})), None).await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_reaps_connections_with_closed_receivers() {
        let manager = EndpointManager::new();
        let (conn_dead, rx_dead) = test_connection("ws");
        drop(rx_dead);
        manager.add_connection(conn_dead).await;
        assert_eq!(manager.connection_count().await, 1);

        manager.broadcast("/notice", None, None).await;

        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn event_delivered_only_to_subscribers() {
        let manager = EndpointManager::new();
        let (conn_sub, mut rx_sub) = test_connection("ws");
        let (conn_other, mut rx_other) = test_connection("ws");
        let sub_id = conn_sub.id;
        manager.add_connection(conn_sub).await;
        manager.add_connection(conn_other).await;

        manager.subscribe(sub_id, "room:1").await;
        manager.emit_event("room:1", Some(serde_json::json!({"msg": "hi"}))).await;

        assert!(rx_sub.recv().await.is_some());
        tokio::time::timeout(std::time::Duration::from_millis(20), rx_other.recv())
            .await
            .expect_err("non-subscriber should not receive the event");
    }

    #[tokio::test]
    async fn close_removes_from_live_set_and_every_topic_bucket() {
        let manager = EndpointManager::new();
        let (conn, _rx) = test_connection("ws");
        let id = conn.id;
        manager.add_connection(conn).await;
        manager.subscribe(id, "room:1").await;
        manager.subscribe(id, "room:2").await;

        manager.close(id).await;

        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.topics.read().await.is_empty());
    }
}
