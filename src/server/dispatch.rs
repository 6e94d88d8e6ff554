//! The server manager's per-frame dispatch algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::Value;

use crate::error::Error;
use crate::frame::{Frame, Method};
use crate::path::split_url;
use crate::route::{Next, RouteResolver};
use crate::session::Session;

use super::connection::ConnectionId;
use super::manager::EndpointManager;

/// Everything a handler or middleware sees for one inbound request.
pub struct RequestContext {
    pub url: String,
    pub method: Method,
    pub plugin_id: Option<String>,
    pub ip: Option<String>,
    pub session: Session,
    pub data: Option<Value>,
    pub id: Option<String>,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    connection_id: ConnectionId,
    manager: Arc<EndpointManager>,
}

impl RequestContext {
    /// Broadcast a frame to every live connection on this endpoint.
    pub async fn broadcast(&self, url: impl Into<String>, data: Option<Value>, method: Option<Method>) {
        self.manager.broadcast(url, data, method).await;
    }

    /// Emit a topic event to this endpoint's subscribers of `topic`.
    pub async fn emit_event(&self, topic: &str, data: Option<Value>) {
        self.manager.emit_event(topic, data).await;
    }

    /// Subscribe the calling connection to a topic.
    pub async fn subscribe(&self, topic: impl Into<String>) {
        self.manager.subscribe(self.connection_id, topic).await;
    }

    /// Unsubscribe the calling connection from a topic.
    pub async fn unsubscribe(&self, topic: &str) {
        self.manager.unsubscribe(self.connection_id, topic).await;
    }
}

/// Process one inbound text frame for `connection_id`, implementing
/// the parse → validate → route → respond algorithm. Errors are never
/// allowed to escape: every failure path sends (or silently drops, for
/// fire-and-forget) an in-band error frame.
pub async fn dispatch_frame(
    manager: &Arc<EndpointManager>,
    routes: &(dyn RouteResolver),
    connection_id: ConnectionId,
    raw: &str,
    suppress_logs: bool,
) {
    let Some(connection) = manager.get(connection_id).await else {
        return;
    };

    let frame: Frame = match Frame::from_json(raw) {
        Ok(f) => f,
        Err(_) => {
            if !suppress_logs {
                tracing::debug!("invalid JSON message on connection {connection_id}");
            }
            send_frame(&connection, Frame::protocol_error("Invalid JSON message", None)).await;
            return;
        }
    };

    if frame.url.is_empty() {
        send_frame(
            &connection,
            Frame::protocol_error("Missing required field: url", frame.id.clone()),
        )
        .await;
        return;
    }

    let (pathname, query) = split_url(&frame.url);

    let Some((handler, middlewares, params)) = routes.resolve(frame.method, &pathname).await else {
        if let Some(id) = frame.id.clone() {
            let message = Error::NoRouteMatched {
                method: frame.method.to_string(),
                url: frame.url.clone(),
            }
            .wire_message();
            send_frame(&connection, Frame::error_response(frame.url.clone(), Some(id), message)).await;
        } else if !suppress_logs {
            tracing::debug!(url = %frame.url, "no route matched fire-and-forget frame, dropping");
        }
        return;
    };

    let ctx = RequestContext {
        url: frame.url.clone(),
        method: frame.method,
        plugin_id: None,
        ip: connection.client_ip.clone(),
        session: connection.session.clone(),
        data: frame.data.clone(),
        id: frame.id.clone(),
        params,
        query,
        connection_id,
        manager: manager.clone(),
    };

    let next = Next::new(middlewares, handler);
    let result = next.call(ctx).await;

    match (result, frame.id) {
        (Ok(value), Some(id)) => {
            send_frame(&connection, Frame::response(frame.url, Some(id), Some(value))).await;
        }
        (Ok(_), None) => {}
        (Err(err), Some(id)) => {
            if !suppress_logs {
                tracing::error!(error = %err, "handler failed");
            }
            send_frame(&connection, Frame::error_response(frame.url, Some(id), err.wire_message())).await;
        }
        (Err(err), None) => {
            if !suppress_logs {
                tracing::error!(error = %err, "fire-and-forget handler failed");
            }
        }
    }
}

async fn send_frame(connection: &super::connection::WebSocketConnection, frame: Frame) {
    let Ok(text) = frame.to_json() else {
        tracing::debug!("failed to serialize outgoing frame");
        return;
    };
    if connection.send(Message::Text(text.into())).await.is_err() {
        tracing::debug!(connection = %connection.id, "send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteTable;
    use crate::session::SessionStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn ok_handler(_ctx: RequestContext) -> crate::route::HandlerFuture {
        Box::pin(async { Ok(json!({"echo": true})) })
    }

    async fn setup() -> (Arc<EndpointManager>, mpsc::Receiver<Message>, ConnectionId) {
        let manager = Arc::new(EndpointManager::new());
        let (tx, rx) = mpsc::channel(32);
        let sessions = SessionStore::new();
        let (session, _) = sessions.get_or_create(None);
        let conn = Arc::new(super::super::connection::WebSocketConnection::new("ws", tx, session));
        let id = conn.id;
        manager.add_connection(conn).await;
        (manager, rx, id)
    }

    #[tokio::test]
    async fn request_with_id_gets_correlated_response() {
        let (manager, mut rx, id) = setup().await;
        let mut routes = RouteTable::new();
        routes.get("/api/ping", ok_handler, Vec::new()).unwrap();

        let frame = Frame::request(Method::Get, "/api/ping", None);
        let sent_id = frame.id.clone().unwrap();
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text message");
        };
        let response = Frame::from_json(&text).unwrap();
        assert_eq!(response.id, Some(sent_id));
        assert_eq!(response.data, Some(json!({"echo": true})));
    }

    #[tokio::test]
    async fn fire_and_forget_gets_no_response() {
        let (manager, mut rx, id) = setup().await;
        let mut routes = RouteTable::new();
        routes.get("/api/ping", ok_handler, Vec::new()).unwrap();

        let frame = Frame::send(Method::Get, "/api/ping", None);
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        let result = tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv()).await;
        assert!(result.is_err(), "fire-and-forget frame should not elicit a response");
    }

    #[tokio::test]
    async fn unmatched_route_with_id_sends_error_frame() {
        let (manager, mut rx, id) = setup().await;
        let routes = RouteTable::new();

        let frame = Frame::request(Method::Get, "/api/missing", None);
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text message");
        };
        let response = Frame::from_json(&text).unwrap();
        let error = response.data.unwrap()["error"].as_str().unwrap().to_string();
        assert!(error.contains("No route matched"));
    }

    #[tokio::test]
    async fn invalid_json_elicits_protocol_error_frame() {
        let (manager, mut rx, id) = setup().await;
        let routes = RouteTable::new();

        dispatch_frame(&manager, &routes, id, "{not json", true).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text message");
        };
        let response = Frame::from_json(&text).unwrap();
        assert_eq!(response.url, "/error");
    }

    #[tokio::test]
    async fn first_registered_route_wins_on_duplicate_match() {
        let (manager, mut rx, id) = setup().await;
        let mut routes = RouteTable::new();
        routes
            .get("/api/dup", |_ctx: RequestContext| Box::pin(async { Ok(json!("first")) }) as crate::route::HandlerFuture, Vec::new())
            .unwrap();
        routes
            .get("/api/dup", |_ctx: RequestContext| Box::pin(async { Ok(json!("second")) }) as crate::route::HandlerFuture, Vec::new())
            .unwrap();

        let frame = Frame::request(Method::Get, "/api/dup", None);
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text message");
        };
        let response = Frame::from_json(&text).unwrap();
        assert_eq!(response.data, Some(json!("first")));
    }
}
