//! WebSocket hosting: per-endpoint upgrade handling, session
//! attachment through the auth gate, the per-connection socket loop,
//! and graceful shutdown.

pub mod connection;
pub mod dispatch;
pub mod manager;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::signal;

use crate::error::Result;
use crate::middleware::{auth_middleware, observability_middleware};
use crate::route::Middleware;
use crate::session::{build_set_cookie, is_secure_request, parse_cookie};
use crate::state::AppState;

use connection::{ConnectionId, WebSocketConnection};
use dispatch::dispatch_frame;

/// The middleware chain every registered route runs under: the auth
/// gate first, then structured request logging.
#[must_use]
pub fn standard_middlewares(state: &AppState) -> Vec<Arc<dyn Middleware>> {
    vec![
        Arc::new(auth_middleware(state.auth_gate_handle())),
        Arc::new(observability_middleware()),
    ]
}

/// Build the router mounting one WebSocket upgrade handler per
/// configured endpoint (`/ws`, `/bunchy`, ...).
#[must_use]
pub fn router(state: AppState) -> Router {
    let mut router = Router::new();
    for name in state.config().server.endpoints.clone() {
        let endpoint = name.clone();
        router = router.route(
            &name,
            get(move |ws: WebSocketUpgrade, headers: HeaderMap, State(state): State<AppState>| {
                let endpoint = endpoint.clone();
                async move { upgrade(endpoint, ws, headers, state).await }
            }),
        );
    }
    router.with_state(state)
}

/// Run the server until a shutdown signal arrives, binding to
/// `config.server.host`/`port`.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config().server.host, state.config().server.port)
        .parse()
        .map_err(|e| crate::error::Error::Internal(format!("invalid bind address: {e}")))?;

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}

/// Handle an upgrade request for one configured endpoint: resolve the
/// caller's session from its cookie (minting one if absent), run the
/// auth gate against the endpoint path, and — on acceptance — complete
/// the WebSocket handshake while stamping the session cookie on the
/// response.
async fn upgrade(endpoint: String, ws: WebSocketUpgrade, headers: HeaderMap, state: AppState) -> Response {
    let cookie_name = state.config().session.cookie_name.clone();
    let cookie_value = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| parse_cookie(raw, &cookie_name));
    let (session, _is_new) = state.sessions().get_or_create(cookie_value.as_deref());

    if let Err(err) = state.auth_gate().check(&endpoint, &session).await {
        return err.into_response();
    }

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());

    let forwarded_proto = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok());
    let secure = state.config().session.secure || is_secure_request(forwarded_proto, None);
    let set_cookie = build_set_cookie(
        &cookie_name,
        session.id(),
        &state.config().session.path,
        &state.config().session.same_site,
        secure,
    );

    let manager = state.endpoint_manager(&endpoint);
    let resolver = Arc::new(state.route_resolver(&endpoint));
    let devcontext = state.devcontext_handle();
    let ping_interval_secs = state.config().server.ping_interval_secs;

    let mut response = ws.on_upgrade(move |socket| {
        handle_socket(
            endpoint,
            socket,
            manager,
            resolver,
            devcontext,
            session,
            client_ip,
            ping_interval_secs,
        )
    });

    if let Ok(value) = set_cookie.parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    response
}

/// Drive one accepted connection until it closes: a writer half
/// forwarding the connection's outbound channel to the socket, and a
/// reader half feeding every inbound text frame through
/// [`dispatch_frame`]. A ticking interval keeps the connection alive
/// with protocol-level pings.
async fn handle_socket(
    endpoint: String,
    socket: WebSocket,
    manager: Arc<manager::EndpointManager>,
    resolver: Arc<crate::state::EndpointRoutes>,
    devcontext: Arc<crate::devcontext::DevContext>,
    session: crate::session::Session,
    client_ip: Option<String>,
    ping_interval_secs: u64,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Message>(64);

    let mut connection = WebSocketConnection::new(endpoint.as_str(), tx, session);
    if let Some(ip) = client_ip.clone() {
        connection = connection.with_client_ip(ip);
    }
    let connection = Arc::new(connection);
    let connection_id: ConnectionId = connection.id;
    manager.add_connection(connection).await;

    devcontext.push_ws(
        format!("connection opened on {endpoint}"),
        Some(json!({"connection_id": connection_id.to_string(), "ip": client_ip})),
    );

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(ping_interval_secs.max(1)));
    ticker.tick().await; // first tick fires immediately; discard it

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&manager, resolver.as_ref(), connection_id, &text, false).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(connection = %connection_id, error = %err, "socket read error");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if manager.get(connection_id).await.is_none() {
                    break;
                }
            }
        }
    }

    writer.abort();
    let user_id = manager.close(connection_id).await;
    devcontext.push_ws(
        format!("connection closed on {endpoint}"),
        Some(json!({"connection_id": connection_id.to_string(), "user_id": user_id})),
    );
}
