//! The per-endpoint route table.
//!
//! A route is registered once, at startup, through one of the four
//! verb helpers; dispatch walks the table in registration order and
//! invokes the first route whose pattern and method both match.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::frame::Method;
use crate::path::Pattern;
use crate::server::dispatch::RequestContext;

/// The boxed, type-erased future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A route handler: given the request context, produce a JSON value
/// (or an error) asynchronously.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin(self(ctx))
    }
}

/// One middleware step: receives the context and the remaining chain
/// as `next`, and must invoke `next` at most once.
pub trait Middleware: Send + Sync {
    fn call(&self, ctx: RequestContext, next: Next) -> HandlerFuture;
}

impl<F> Middleware for F
where
    F: Fn(RequestContext, Next) -> HandlerFuture + Send + Sync,
{
    fn call(&self, ctx: RequestContext, next: Next) -> HandlerFuture {
        self(ctx, next)
    }
}

/// A handle to the remainder of a middleware chain. Enforces "called
/// at most once": a second invocation yields `Error::MiddlewareMisuse`
/// instead of re-entering the chain.
pub struct Next {
    inner: Arc<NextInner>,
}

struct NextInner {
    chain: Vec<Arc<dyn Middleware>>,
    index: usize,
    handler: Arc<dyn Handler>,
    used: std::sync::atomic::AtomicBool,
}

impl Next {
    pub(crate) fn new(chain: Vec<Arc<dyn Middleware>>, handler: Arc<dyn Handler>) -> Self {
        Self {
            inner: Arc::new(NextInner {
                chain,
                index: 0,
                handler,
                used: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    fn at(inner: &Arc<NextInner>, index: usize) -> Self {
        Self {
            inner: Arc::new(NextInner {
                chain: inner.chain.clone(),
                index,
                handler: inner.handler.clone(),
                used: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Invoke the next middleware (or the terminal handler if the
    /// chain is exhausted). Calling this a second time on the same
    /// `Next` returns `MiddlewareMisuse` rather than running anything.
    pub fn call(self, ctx: RequestContext) -> HandlerFuture {
        if self
            .inner
            .used
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return Box::pin(async { Err(Error::MiddlewareMisuse("middleware chain".into())) });
        }

        let inner = self.inner.clone();
        match inner.chain.get(inner.index) {
            Some(middleware) => {
                let middleware = middleware.clone();
                let next = Next::at(&inner, inner.index + 1);
                middleware.call(ctx, next)
            }
            None => inner.handler.call(ctx),
        }
    }
}

/// A registered route: method, compiled pattern, middleware chain, and
/// terminal handler.
pub struct Route {
    pub method: Method,
    pub pattern: Pattern,
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub handler: Arc<dyn Handler>,
}

/// An ordered table of routes for one endpoint. Registration order is
/// preserved; dispatch is first-match.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a route. This is the common path every verb helper
    /// calls; insertion order is preserved.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler + 'static,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<()> {
        self.routes.push(Route {
            method,
            pattern: Pattern::compile(pattern),
            middlewares,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler + 'static, middlewares: Vec<Arc<dyn Middleware>>) -> Result<()> {
        self.register(Method::Get, pattern, handler, middlewares)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler + 'static, middlewares: Vec<Arc<dyn Middleware>>) -> Result<()> {
        self.register(Method::Post, pattern, handler, middlewares)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler + 'static, middlewares: Vec<Arc<dyn Middleware>>) -> Result<()> {
        self.register(Method::Put, pattern, handler, middlewares)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler + 'static, middlewares: Vec<Arc<dyn Middleware>>) -> Result<()> {
        self.register(Method::Delete, pattern, handler, middlewares)
    }

    /// Find the first route whose pattern matches `pathname` and whose
    /// method equals `method`, returning it along with the captured
    /// path parameters.
    #[must_use]
    pub fn find(&self, method: Method, pathname: &str) -> Option<(&Route, HashMap<String, String>)> {
        self.routes.iter().find_map(|route| {
            if route.method != method {
                return None;
            }
            route.pattern.matches(pathname).map(|params| (route, params))
        })
    }
}

/// Abstracts "find a route for (method, pathname)" so the dispatcher
/// can work against either a bare `RouteTable` (tests) or a lock-guarded
/// per-endpoint table reached through `AppState` (production), without
/// holding a table-wide lock across the handler's own `.await`.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve(
        &self,
        method: Method,
        pathname: &str,
    ) -> Option<(Arc<dyn Handler>, Vec<Arc<dyn Middleware>>, HashMap<String, String>)>;
}

#[async_trait]
impl RouteResolver for RouteTable {
    async fn resolve(
        &self,
        method: Method,
        pathname: &str,
    ) -> Option<(Arc<dyn Handler>, Vec<Arc<dyn Middleware>>, HashMap<String, String>)> {
        let (route, params) = self.find(method, pathname)?;
        Some((route.handler.clone(), route.middlewares.clone(), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_handler(_ctx: RequestContext) -> HandlerFuture {
        Box::pin(async { Ok(json!({"ok": true})) })
    }

    #[test]
    fn first_match_wins_on_duplicate_patterns() {
        let mut table = RouteTable::new();
        table.get("/a/:id", ok_handler, Vec::new()).unwrap();
        table.get("/a/:id", ok_handler, Vec::new()).unwrap();
        let (route, params) = table.find(Method::Get, "/a/7").unwrap();
        assert_eq!(params.get("id"), Some(&"7".to_string()));
        assert!(std::ptr::eq(route, &table.routes[0]));
    }

    #[test]
    fn method_mismatch_does_not_match() {
        let mut table = RouteTable::new();
        table.post("/a", ok_handler, Vec::new()).unwrap();
        assert!(table.find(Method::Get, "/a").is_none());
    }
}
