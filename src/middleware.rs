//! The default "observability" and "auth gate" middlewares prepended
//! to every endpoint's route list, plus the composer types they're
//! built from (re-exported from [`crate::route`]).

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthGate;
use crate::path::split_url;
use crate::route::{HandlerFuture, Middleware, Next};
use crate::server::dispatch::RequestContext;

/// Name of the environment variable tests set to suppress the
/// structured request-completion log line.
pub const SUPPRESS_LOG_ENV: &str = "WS_SUPPRESS_OBSERVABILITY_LOG";

fn logging_suppressed() -> bool {
    std::env::var(SUPPRESS_LOG_ENV).map(|v| v == "1").unwrap_or(false)
}

/// Records start time, delegates to the rest of the chain, and emits a
/// structured log line on completion (method, path, duration, and the
/// optional plugin tag / client IP taken from the context). On error
/// it logs and re-raises rather than swallowing the failure.
pub fn observability_middleware() -> impl Middleware {
    |ctx: RequestContext, next: Next| -> HandlerFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.method;
            let url = ctx.url.clone();
            let plugin_id = ctx.plugin_id.clone();
            let ip = ctx.ip.clone();

            let result = next.call(ctx).await;
            let duration = start.elapsed();

            match &result {
                Ok(_) => {
                    if !logging_suppressed() {
                        tracing::info!(
                            %method,
                            url = %url,
                            duration_ms = duration.as_millis() as u64,
                            ?plugin_id,
                            ?ip,
                            "request completed"
                        );
                    }
                }
                Err(err) => {
                    if !logging_suppressed() {
                        tracing::error!(
                            %method,
                            url = %url,
                            duration_ms = duration.as_millis() as u64,
                            ?plugin_id,
                            ?ip,
                            error = %err,
                            "request failed"
                        );
                    }
                }
            }

            result
        })
    }
}

/// Gates every routed frame through the session/auth gate before the
/// rest of the chain runs. Registered as the first middleware on every
/// route so `/api/*` paths are checked on each frame, not just at
/// connection upgrade.
pub fn auth_middleware(gate: Arc<AuthGate>) -> impl Middleware {
    move |ctx: RequestContext, next: Next| -> HandlerFuture {
        let gate = gate.clone();
        Box::pin(async move {
            let (pathname, _) = split_url(&ctx.url);
            gate.check(&pathname, &ctx.session).await?;
            next.call(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use crate::frame::Method;
    use crate::route::{Handler, RouteTable};
    use crate::server::connection::WebSocketConnection;
    use crate::server::dispatch::dispatch_frame;
    use crate::server::manager::EndpointManager;
    use crate::session::SessionStore;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn ok_handler(_ctx: RequestContext) -> HandlerFuture {
        Box::pin(async { Ok(json!({"ok": true})) })
    }

    #[tokio::test]
    async fn observability_middleware_does_not_block_successful_dispatch() {
        std::env::set_var(SUPPRESS_LOG_ENV, "1");

        let manager = Arc::new(EndpointManager::new());
        let (tx, mut rx) = mpsc::channel(32);
        let sessions = SessionStore::new();
        let (session, _) = sessions.get_or_create(None);
        let conn = Arc::new(WebSocketConnection::new("ws", tx.clone(), session));
        let id = conn.id;
        manager.add_connection(conn).await;

        let mut routes = RouteTable::new();
        routes
            .get("/api/ping", ok_handler, vec![Arc::new(observability_middleware())])
            .unwrap();

        let frame = crate::frame::Frame::request(Method::Get, "/api/ping", None);
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        drop(tx);
        assert!(rx.recv().await.is_some());
        std::env::remove_var(SUPPRESS_LOG_ENV);
    }

    #[tokio::test]
    async fn auth_middleware_blocks_anonymous_api_request() {
        use crate::auth::{AuthConfig, AuthGate, InMemoryUserStore};

        let manager = Arc::new(EndpointManager::new());
        let (tx, mut rx) = mpsc::channel(32);
        let sessions = SessionStore::new();
        let (session, _) = sessions.get_or_create(None);
        let conn = Arc::new(WebSocketConnection::new("ws", tx, session));
        let id = conn.id;
        manager.add_connection(conn).await;

        let gate = Arc::new(AuthGate::new(AuthConfig::default(), Arc::new(InMemoryUserStore::new())));
        let mut routes = RouteTable::new();
        routes
            .get("/api/widgets", ok_handler, vec![Arc::new(auth_middleware(gate))])
            .unwrap();

        let frame = crate::frame::Frame::request(Method::Get, "/api/widgets", None);
        let sent_id = frame.id.clone().unwrap();
        dispatch_frame(&manager, &routes, id, &frame.to_json().unwrap(), true).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text message");
        };
        let response = crate::frame::Frame::from_json(&text).unwrap();
        assert_eq!(response.id, Some(sent_id));
        let error = response.data.unwrap()["error"].as_str().unwrap().to_string();
        assert!(error.contains("Unauthorized"));
    }
}
