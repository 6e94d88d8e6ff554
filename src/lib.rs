//! # duplexio
//!
//! A bidirectional WebSocket application protocol: a single symmetric
//! JSON frame exchanged in both directions, a per-endpoint route
//! table dispatched through a composable middleware chain, a
//! connection/topic manager for broadcast and pub/sub, a cookie-backed
//! session store gated by a development-friendly auth layer, and a
//! reconnecting client runtime built on the same frame format.
//!
//! ## Example
//!
//! ```rust,no_run
//! use duplexio::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config).build()?;
//!     state
//!         .with_routes("/ws", |routes| {
//!             routes
//!                 .get(
//!                     "/api/ping",
//!                     |_ctx: RequestContext| Box::pin(async { Ok(serde_json::json!("pong")) }),
//!                     Vec::new(),
//!                 )
//!                 .unwrap();
//!         })
//!         .await;
//!
//!     serve(state).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod devcontext;
pub mod error;
pub mod frame;
pub mod middleware;
pub mod observability;
pub mod path;
pub mod route;
pub mod server;
pub mod session;
pub mod state;

pub mod client;

/// Convenient re-exports for the common building blocks of an
/// application built on this crate.
pub mod prelude {
    pub use crate::auth::{AuthConfig, AuthGate, InMemoryUserStore, NoSecurity, User, UserStore};
    pub use crate::client::{Client, ClientState};
    pub use crate::config::{ClientConfig, Config};
    pub use crate::devcontext::DevContext;
    pub use crate::error::{Error, Result};
    pub use crate::frame::{Frame, Method};
    pub use crate::middleware::{auth_middleware, observability_middleware};
    pub use crate::observability::init_tracing;
    pub use crate::route::{Handler, HandlerFuture, Middleware, Next, RouteResolver, RouteTable};
    pub use crate::server::dispatch::RequestContext;
    pub use crate::server::{router, serve, standard_middlewares};
    pub use crate::session::{Session, SessionStore};
    pub use crate::state::{AppState, AppStateBuilder};

    pub use serde_json::{json, Value};
}

#[cfg(test)]
mod tests {
    //! End-to-end coverage exercising a real client against a real
    //! server over a loopback socket, rather than dispatching frames
    //! directly — the unit tests in `server/dispatch.rs`, `route.rs`,
    //! and `client/runtime.rs` already cover those algorithms in
    //! isolation.

    use std::net::SocketAddr;

    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::config::{ClientConfig, Config};
    use crate::frame::Method;
    use crate::state::AppState;

    async fn spawn_server() -> SocketAddr {
        let mut config = Config::default();
        config.server.port = 0;
        config.server.endpoints = vec!["/ws".to_string()];

        let state = AppState::builder().config(config).build().unwrap();
        state
            .with_routes("/ws", |routes| {
                routes
                    .get(
                        "/api/ping",
                        |_ctx: crate::server::dispatch::RequestContext| -> crate::route::HandlerFuture {
                            Box::pin(async { Ok(json!("pong")) })
                        },
                        Vec::new(),
                    )
                    .unwrap();
                routes
                    .get(
                        "/api/broadcast",
                        |ctx: crate::server::dispatch::RequestContext| -> crate::route::HandlerFuture {
                            Box::pin(async move {
                                ctx.broadcast("/notices/new", Some(json!({"n": 1})), None).await;
                                Ok(json!("sent"))
                            })
                        },
                        Vec::new(),
                    )
                    .unwrap();
            })
            .await;

        let app = crate::server::router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn client_request_round_trips_through_a_real_server() {
        let addr = spawn_server().await;
        let client = crate::client::Client::connect(format!("ws://{addr}/ws"), ClientConfig::default());

        // The connection attempt races the listener's accept loop; give
        // it a moment to reach `Open` before issuing a request.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let response = client.request(Method::Get, "/api/ping", None).await.unwrap();
        assert_eq!(response, json!("pong"));
        client.close();
    }

    #[tokio::test]
    async fn client_listener_receives_a_server_broadcast() {
        let addr = spawn_server().await;
        let client = crate::client::Client::connect(format!("ws://{addr}/ws"), ClientConfig::default());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        client
            .on("/notices/:kind", move |frame, params| {
                assert_eq!(params.get("kind"), Some(&"new".to_string()));
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(frame.data.clone());
                }
            })
            .await;

        client.request(Method::Get, "/api/broadcast", None).await.unwrap();
        let data = tokio::time::timeout(std::time::Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data, Some(json!({"n": 1})));
        client.close();
    }
}
