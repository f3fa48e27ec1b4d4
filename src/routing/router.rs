//! Route table with router-scoped middleware.
//!
//! # Responsibilities
//! - Store routes keyed by (method, pattern) in registration order
//! - Resolve a (method, path) pair to a handler chain and bound params
//! - Prepend router-scoped middleware to every resolved chain
//!
//! # Design Decisions
//! - Exact key lookup first (pathname taken literally), then a linear
//!   pattern scan in registration order
//! - First structurally compatible pattern wins, even if a later one is
//!   more specific
//! - Re-registering a key appends handlers instead of replacing them
//! - Explicit `None` rather than a silent default

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::http::handler::{BoxedHandler, Handler};
use crate::routing::matcher::{Params, PathPattern};

/// A (method, path pattern) pair identifying a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.path)
    }
}

/// Result of a successful lookup.
#[derive(Clone)]
pub struct RouteMatch {
    /// Handlers to run, in order.
    pub handlers: Vec<BoxedHandler>,
    /// Parameters bound from the path.
    pub params: Params,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("handlers", &self.handlers.len())
            .field("params", &self.params)
            .finish()
    }
}

/// Anything that can be mounted under a prefix of an `App`.
pub trait Mountable: Send + Sync {
    /// Resolve a path relative to the mount prefix.
    fn find_route(&self, method: &Method, pathname: &str) -> Option<RouteMatch>;
}

struct RouteEntry {
    key: RouteKey,
    pattern: PathPattern,
    handlers: Vec<BoxedHandler>,
}

/// An independently instantiable route table.
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
    index: HashMap<RouteKey, usize>,
    middleware: Vec<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append router-scoped middleware. Applies to every route resolved
    /// through this router, whenever it was registered.
    pub fn use_middleware<H: Handler>(&mut self, middleware: H) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append handlers under (method, path).
    pub fn add_route<I>(&mut self, method: Method, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = BoxedHandler>,
    {
        let key = RouteKey::new(method, path);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.routes.push(RouteEntry {
                    key: key.clone(),
                    pattern: PathPattern::parse(path),
                    handlers: Vec::new(),
                });
                self.index.insert(key, self.routes.len() - 1);
                self.routes.len() - 1
            }
        };
        self.routes[slot].handlers.extend(handlers);
        self
    }

    /// Append a single handler under (method, path).
    pub fn route<H: Handler>(&mut self, method: Method, path: &str, handler: H) -> &mut Self {
        let handler: BoxedHandler = Arc::new(handler);
        self.add_route(method, path, [handler])
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::DELETE, path, handler)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.iter().map(|entry| &entry.key)
    }

    /// Resolve a (method, path) pair.
    pub fn find_route(&self, method: &Method, pathname: &str) -> Option<RouteMatch> {
        let exact = RouteKey::new(method.clone(), pathname);
        if let Some(&slot) = self.index.get(&exact) {
            return Some(self.chain(&self.routes[slot], Params::new()));
        }

        self.routes
            .iter()
            .filter(|entry| entry.key.method == *method)
            .find_map(|entry| {
                entry
                    .pattern
                    .matches(pathname)
                    .map(|params| self.chain(entry, params))
            })
    }

    fn chain(&self, entry: &RouteEntry, params: Params) -> RouteMatch {
        let handlers = self
            .middleware
            .iter()
            .chain(entry.handlers.iter())
            .cloned()
            .collect();
        RouteMatch { handlers, params }
    }
}

impl Mountable for Router {
    fn find_route(&self, method: &Method, pathname: &str) -> Option<RouteMatch> {
        Router::find_route(self, method, pathname)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.keys().map(ToString::to_string).collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
