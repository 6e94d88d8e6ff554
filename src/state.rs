//! Process-wide application state: the session store, one
//! [`EndpointManager`]/[`RouteTable`] pair per configured endpoint, the
//! user store, the dev-context ring buffer, and the loaded config,
//! assembled through a builder the way the teacher's `AppStateBuilder`
//! assembles its connection pools.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use async_trait::async_trait;

use crate::auth::{AuthGate, InMemoryUserStore, UserStore};
use crate::config::Config;
use crate::devcontext::DevContext;
use crate::error::Result;
use crate::frame::Method;
use crate::route::{Handler, Middleware, RouteResolver, RouteTable};
use crate::server::manager::EndpointManager;
use crate::session::SessionStore;

/// Per-endpoint resources: the live-connection manager and its route
/// table. The route table is write-once at startup, then read-only
/// for the process lifetime; the `RwLock` lets the dispatcher hold a
/// read guard across the handler's `.await` without blocking other
/// concurrent dispatches.
pub struct Endpoint {
    pub manager: Arc<EndpointManager>,
    pub routes: RwLock<RouteTable>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            manager: Arc::new(EndpointManager::new()),
            routes: RwLock::new(RouteTable::new()),
        }
    }
}

/// Shared, process-wide application state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    sessions: Arc<SessionStore>,
    endpoints: Arc<DashMap<String, Endpoint>>,
    user_store: Arc<dyn UserStore>,
    auth_gate: Arc<AuthGate>,
    devcontext: Arc<DevContext>,
}

impl AppState {
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn user_store(&self) -> &Arc<dyn UserStore> {
        &self.user_store
    }

    #[must_use]
    pub fn auth_gate(&self) -> &AuthGate {
        &self.auth_gate
    }

    /// An owned handle to the auth gate, for middleware closures that
    /// must be `'static`.
    #[must_use]
    pub fn auth_gate_handle(&self) -> Arc<AuthGate> {
        self.auth_gate.clone()
    }

    #[must_use]
    pub fn devcontext(&self) -> &DevContext {
        &self.devcontext
    }

    /// An owned handle to the dev-context ring buffers, for tasks that
    /// outlive the request that spawned them (e.g. a connection's
    /// socket loop).
    #[must_use]
    pub fn devcontext_handle(&self) -> Arc<DevContext> {
        self.devcontext.clone()
    }

    /// The connection manager for a configured endpoint name (e.g. `/ws`).
    ///
    /// # Panics
    ///
    /// Panics if `name` was not one of `config.server.endpoints` at
    /// build time; endpoints are fixed at startup, not created on
    /// demand.
    #[must_use]
    pub fn endpoint_manager(&self, name: &str) -> Arc<EndpointManager> {
        self.endpoints
            .get(name)
            .unwrap_or_else(|| panic!("no such endpoint: {name}"))
            .manager
            .clone()
    }

    /// Register routes into the named endpoint's table. Intended for
    /// startup use, before the server begins accepting connections.
    pub async fn with_routes(&self, name: &str, f: impl FnOnce(&mut RouteTable)) {
        let entry = self
            .endpoints
            .get(name)
            .unwrap_or_else(|| panic!("no such endpoint: {name}"));
        let mut routes = entry.routes.write().await;
        f(&mut routes);
    }

    /// A [`RouteResolver`] scoped to one configured endpoint, suitable
    /// for passing straight into `dispatch_frame`. Acquires the named
    /// endpoint's route table read lock only for the duration of the
    /// lookup, not across the handler's own `.await`.
    ///
    /// # Panics
    ///
    /// Panics if `name` was not one of `config.server.endpoints` at
    /// build time.
    #[must_use]
    pub fn route_resolver(&self, name: &str) -> EndpointRoutes {
        assert!(
            self.endpoints.contains_key(name),
            "no such endpoint: {name}"
        );
        EndpointRoutes {
            endpoints: self.endpoints.clone(),
            name: name.to_string(),
        }
    }
}

/// A [`RouteResolver`] backed by one named endpoint's lock-guarded
/// [`RouteTable`], reached through the shared `AppState` endpoint map.
pub struct EndpointRoutes {
    endpoints: Arc<DashMap<String, Endpoint>>,
    name: String,
}

#[async_trait]
impl RouteResolver for EndpointRoutes {
    async fn resolve(
        &self,
        method: Method,
        pathname: &str,
    ) -> Option<(Arc<dyn Handler>, Vec<Arc<dyn Middleware>>, HashMap<String, String>)> {
        let entry = self.endpoints.get(&self.name)?;
        let routes = entry.routes.read().await;
        routes.resolve(method, pathname).await
    }
}

/// Builds an [`AppState`], mirroring the teacher's builder shape:
/// config first, then the collaborators config and explicit overrides
/// can both influence.
pub struct AppStateBuilder {
    config: Option<Config>,
    user_store: Option<Arc<dyn UserStore>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            user_store: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn user_store(mut self, user_store: Arc<dyn UserStore>) -> Self {
        self.user_store = Some(user_store);
        self
    }

    /// Assemble the `AppState`. Endpoints named in `config.server.endpoints`
    /// are pre-created with empty route tables so `with_routes` always
    /// has somewhere to register into.
    pub fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();
        let user_store = self
            .user_store
            .unwrap_or_else(|| Arc::new(InMemoryUserStore::new()));

        let endpoints: Arc<DashMap<String, Endpoint>> = Arc::new(DashMap::new());
        for name in &config.server.endpoints {
            endpoints.insert(name.clone(), Endpoint::default());
        }

        let auth_gate = Arc::new(AuthGate::new(config.auth.clone(), user_store.clone()));
        let devcontext = Arc::new(DevContext::new(&config.devcontext));

        Ok(AppState {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new()),
            endpoints,
            user_store,
            auth_gate,
            devcontext,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
