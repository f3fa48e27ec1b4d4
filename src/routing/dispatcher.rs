//! Application dispatcher.
//!
//! # Responsibilities
//! - Own global middleware, the flat exact-match table and mount entries
//! - Resolve a request: mounted routers first, then the flat table
//! - Drive the handler chain with a request-local cursor
//! - Route failures to the (pluggable) error handler
//!
//! # Design Decisions
//! - Registration happens on `&mut App`; serving happens on `Arc<App>`,
//!   so the tables are frozen before the first request
//! - Flat routes are exact-match only: `:name` segments there are literal
//! - A panic inside a handler is treated like a returned error
//! - Not Found is a normal outcome and never reaches the error handler

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;

use crate::http::handler::{
    BoxedHandler, ErrorHandler, Flow, Handler, HandlerError, HandlerResult,
};
use crate::http::middleware::BodyParser;
use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;
use crate::routing::matcher::Params;
use crate::routing::router::{Mountable, RouteKey, RouteMatch};

/// A registration accepted by `App::using`.
pub enum Use {
    /// Global middleware, run for every resolved request.
    Middleware(BoxedHandler),
    /// A router serving every path under `prefix`.
    Mount {
        prefix: String,
        router: Arc<dyn Mountable>,
    },
    /// Global middleware that only runs when the pathname starts with `prefix`.
    Scoped { prefix: String, handler: BoxedHandler },
}

impl Use {
    pub fn middleware<H: Handler>(handler: H) -> Self {
        Self::Middleware(Arc::new(handler))
    }

    pub fn mount<M: Mountable + 'static>(prefix: impl Into<String>, router: M) -> Self {
        Self::Mount {
            prefix: prefix.into(),
            router: Arc::new(router),
        }
    }

    pub fn scoped<H: Handler>(prefix: impl Into<String>, handler: H) -> Self {
        Self::Scoped {
            prefix: prefix.into(),
            handler: Arc::new(handler),
        }
    }
}

/// Runs the wrapped handler only under a path prefix.
struct PrefixScoped {
    prefix: String,
    inner: BoxedHandler,
}

impl Handler for PrefixScoped {
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult> {
        if req.pathname.starts_with(&self.prefix) {
            self.inner.call(req, res)
        } else {
            Box::pin(futures_util::future::ready(Ok(Flow::Next)))
        }
    }
}

struct MountEntry {
    prefix: String,
    router: Arc<dyn Mountable>,
}

impl MountEntry {
    /// Path relative to this mount, if the mount applies.
    fn strip<'p>(&self, pathname: &'p str) -> Option<&'p str> {
        if pathname == self.prefix {
            return Some("/");
        }
        pathname
            .strip_prefix(self.prefix.as_str())
            .filter(|rest| rest.starts_with('/'))
    }
}

/// How a request was resolved.
#[derive(Debug)]
pub enum Resolution {
    /// Matched inside the router mounted at `prefix`.
    Mounted { prefix: String, route: RouteMatch },
    /// Matched an exact entry of the flat table.
    Flat(RouteMatch),
    /// Nothing matched.
    NotFound,
}

impl Resolution {
    pub fn into_route(self) -> Option<RouteMatch> {
        match self {
            Resolution::Mounted { route, .. } | Resolution::Flat(route) => Some(route),
            Resolution::NotFound => None,
        }
    }
}

/// Terminal state of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler finalized the response, or the chain ran out.
    Completed,
    /// The error handler ran.
    ErrorHandled,
    /// No route matched; a 404 was written.
    NotFound,
}

/// Request-local cursor over an immutable handler chain.
struct Dispatch<'c> {
    chain: &'c [BoxedHandler],
    cursor: usize,
}

impl<'c> Dispatch<'c> {
    fn new(chain: &'c [BoxedHandler]) -> Self {
        Self { chain, cursor: 0 }
    }

    /// Handler at the cursor, advancing past it. `None` past the end.
    fn advance(&mut self) -> Option<&'c BoxedHandler> {
        let handler = self.chain.get(self.cursor)?;
        self.cursor += 1;
        Some(handler)
    }
}

/// Invoke one handler, turning a panic into a `HandlerError`.
async fn invoke(
    handler: &BoxedHandler,
    req: &mut RequestContext,
    res: &mut ResponseContext,
) -> HandlerResult {
    // `call` itself runs on first poll, so a panic before the handler
    // returns its future is caught here too.
    AssertUnwindSafe(async move { handler.call(req, res).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload)))
}

/// Default error handler: log, then answer 500 unless a response went out.
pub fn default_error_handler(err: &HandlerError, req: &RequestContext, res: &mut ResponseContext) {
    tracing::error!(
        method = %req.method,
        path = %req.pathname,
        error = %err,
        "Handler failed"
    );

    if res.headers_sent() {
        return;
    }
    let payload = json!({
        "success": false,
        "error": "Internal Server Error",
        "message": err.to_string(),
    });
    if let Err(e) = res.status(StatusCode::INTERNAL_SERVER_ERROR).json(&payload) {
        tracing::error!(error = %e, "Failed to write error response");
    }
}

/// The top-level composition root.
pub struct App {
    middleware: Vec<BoxedHandler>,
    routes: HashMap<RouteKey, Vec<BoxedHandler>>,
    mounts: Vec<MountEntry>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl App {
    /// Create an app with the body parser installed as first global middleware.
    pub fn new() -> Self {
        Self::with_body_parser(BodyParser::default())
    }

    /// Create an app whose body parser buffers at most `limit` bytes.
    pub fn with_body_limit(limit: usize) -> Self {
        Self::with_body_parser(BodyParser::new(limit))
    }

    fn with_body_parser(parser: BodyParser) -> Self {
        Self {
            middleware: vec![Arc::new(parser)],
            routes: HashMap::new(),
            mounts: Vec::new(),
            error_handler: Arc::new(default_error_handler),
        }
    }

    /// Apply a registration.
    pub fn using(&mut self, registration: Use) -> &mut Self {
        match registration {
            Use::Middleware(handler) => self.middleware.push(handler),
            Use::Mount { prefix, router } => {
                tracing::debug!(prefix = %prefix, "Router mounted");
                self.mounts.push(MountEntry { prefix, router });
            }
            Use::Scoped { prefix, handler } => {
                self.middleware.push(Arc::new(PrefixScoped {
                    prefix,
                    inner: handler,
                }));
            }
        }
        self
    }

    /// Register global middleware.
    pub fn middleware<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.using(Use::middleware(handler))
    }

    /// Mount a router under `prefix`.
    pub fn mount<M: Mountable + 'static>(&mut self, prefix: &str, router: M) -> &mut Self {
        self.using(Use::mount(prefix, router))
    }

    /// Register middleware that only runs under `prefix`.
    pub fn scoped<H: Handler>(&mut self, prefix: &str, handler: H) -> &mut Self {
        self.using(Use::scoped(prefix, handler))
    }

    /// Set the flat-table handlers for `METHOD:path`, replacing earlier ones.
    pub fn route<I>(&mut self, method: Method, path: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = BoxedHandler>,
    {
        self.routes
            .insert(RouteKey::new(method, path), handlers.into_iter().collect());
        self
    }

    fn single<H: Handler>(&mut self, method: Method, path: &str, handler: H) -> &mut Self {
        let handler: BoxedHandler = Arc::new(handler);
        self.route(method, path, [handler])
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.single(Method::GET, path, handler)
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.single(Method::POST, path, handler)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.single(Method::PUT, path, handler)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.single(Method::PATCH, path, handler)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.single(Method::DELETE, path, handler)
    }

    /// Replace the error handler.
    pub fn set_error_handler<E: ErrorHandler>(&mut self, handler: E) -> &mut Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Resolve a request to a route.
    pub fn resolve(&self, method: &Method, pathname: &str) -> Resolution {
        for mount in &self.mounts {
            let Some(remaining) = mount.strip(pathname) else {
                continue;
            };
            tracing::debug!(
                prefix = %mount.prefix,
                path = %pathname,
                remaining = %remaining,
                "Trying mounted router"
            );
            if let Some(route) = mount.router.find_route(method, remaining) {
                return Resolution::Mounted {
                    prefix: mount.prefix.clone(),
                    route,
                };
            }
        }

        let key = RouteKey::new(method.clone(), pathname);
        match self.routes.get(&key) {
            Some(handlers) => Resolution::Flat(RouteMatch {
                handlers: handlers.clone(),
                params: Params::new(),
            }),
            None => Resolution::NotFound,
        }
    }

    /// Resolve and run one request.
    pub async fn handle(&self, req: &mut RequestContext, res: &mut ResponseContext) -> Outcome {
        tracing::debug!(method = %req.method, path = %req.pathname, "Dispatching request");

        let Some(route) = self.resolve(&req.method, &req.pathname).into_route() else {
            tracing::info!(method = %req.method, path = %req.pathname, "Route not found");
            let payload = json!({
                "success": false,
                "error": "Not Found",
                "path": req.pathname,
                "method": req.method.as_str(),
            });
            if let Err(e) = res.status(StatusCode::NOT_FOUND).json(&payload) {
                tracing::error!(error = %e, "Failed to write not-found response");
            }
            return Outcome::NotFound;
        };

        tracing::debug!(
            handlers = route.handlers.len(),
            params = ?route.params,
            "Route found"
        );
        req.params = route.params;

        let chain: Vec<BoxedHandler> = self
            .middleware
            .iter()
            .cloned()
            .chain(route.handlers)
            .collect();

        let mut dispatch = Dispatch::new(&chain);
        while let Some(handler) = dispatch.advance() {
            match invoke(handler, req, res).await {
                Ok(Flow::Next) => continue,
                Ok(Flow::Done) => return Outcome::Completed,
                Err(err) => {
                    self.error_handler.handle(&err, req, res);
                    return Outcome::ErrorHandled;
                }
            }
        }

        // Continuing past the last handler is a no-op.
        Outcome::Completed
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("middleware", &self.middleware.len())
            .field(
                "routes",
                &self.routes.keys().map(ToString::to_string).collect::<Vec<_>>(),
            )
            .field(
                "mounts",
                &self.mounts.iter().map(|m| m.prefix.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::routing::router::Router;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn trace() -> Trace {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn step(trace: &Trace, tag: &'static str) -> impl Handler {
        let trace = trace.clone();
        handler_fn(move |_req, _res| {
            trace.lock().unwrap().push(tag);
            Ok(Flow::Next)
        })
    }

    fn reply(trace: &Trace, tag: &'static str) -> impl Handler {
        let trace = trace.clone();
        handler_fn(move |_req, res| {
            trace.lock().unwrap().push(tag);
            res.json(&json!({ "tag": tag }))
        })
    }

    async fn dispatch(app: &App, method: Method, target: &str) -> (Outcome, RequestContext, ResponseContext) {
        let mut req = RequestContext::new(method, target);
        let mut res = ResponseContext::new();
        let outcome = app.handle(&mut req, &mut res).await;
        (outcome, req, res)
    }

    fn body(res: &ResponseContext) -> Value {
        res.body_json().expect("json body")
    }

    #[tokio::test]
    async fn flat_route_runs_after_global_middleware() {
        let t = trace();
        let mut app = App::new();
        app.middleware(step(&t, "global-1"));
        app.middleware(step(&t, "global-2"));
        app.route(
            Method::GET,
            "/",
            [boxed_step(&t, "handler-1"), Arc::new(reply(&t, "handler-2")) as BoxedHandler],
        );

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(
            *t.lock().unwrap(),
            vec!["global-1", "global-2", "handler-1", "handler-2"]
        );
        assert_eq!(body(&res)["tag"], "handler-2");
    }

    fn boxed_step(trace: &Trace, tag: &'static str) -> BoxedHandler {
        Arc::new(step(trace, tag))
    }

    #[tokio::test]
    async fn flat_registration_replaces_handlers() {
        let t = trace();
        let mut app = App::new();
        app.get("/", reply(&t, "old"));
        app.get("/", reply(&t, "new"));

        let (_, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(body(&res)["tag"], "new");
        assert_eq!(*t.lock().unwrap(), vec!["new"]);
    }

    // Flat routes are exact-match only; parameter syntax is not interpreted.
    #[tokio::test]
    async fn flat_routes_do_not_bind_params() {
        let t = trace();
        let mut app = App::new();
        app.get("/performers/:id", reply(&t, "flat"));

        let (outcome, _, res) = dispatch(&app, Method::GET, "/performers/7").await;
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let (outcome, req, _) = dispatch(&app, Method::GET, "/performers/:id").await;
        assert_eq!(outcome, Outcome::Completed);
        assert!(req.params.is_empty());
    }

    #[tokio::test]
    async fn mounted_router_binds_params() {
        let t = trace();
        let mut performers = Router::new();
        performers.get("/:id", reply(&t, "by-id"));

        let mut app = App::new();
        app.mount("/performers", performers);

        let (outcome, req, res) = dispatch(&app, Method::GET, "/performers/7").await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(body(&res)["tag"], "by-id");
    }

    #[tokio::test]
    async fn mount_prefix_resolves_sub_paths_and_root() {
        let t = trace();
        let mut router = Router::new();
        router.get("/", reply(&t, "root"));
        router.get("/y", reply(&t, "y"));

        let mut app = App::new();
        app.mount("/x", router);

        let (_, req, res) = dispatch(&app, Method::GET, "/x/y").await;
        assert!(req.params.is_empty());
        assert_eq!(body(&res)["tag"], "y");

        let (_, _, res) = dispatch(&app, Method::GET, "/x").await;
        assert_eq!(body(&res)["tag"], "root");

        let (_, _, res) = dispatch(&app, Method::GET, "/x/").await;
        assert_eq!(body(&res)["tag"], "root");

        // A shared leading string is not a path boundary.
        let (outcome, _, _) = dispatch(&app, Method::GET, "/xy").await;
        assert_eq!(outcome, Outcome::NotFound);
    }

    #[tokio::test]
    async fn mounts_are_tried_before_flat_table_in_order() {
        let t = trace();
        let mut first = Router::new();
        first.get("/only-first", reply(&t, "first"));
        let mut second = Router::new();
        second.get("/shared", reply(&t, "second"));

        let mut app = App::new();
        app.mount("/api", first);
        app.mount("/api", second);
        app.get("/api/shared", reply(&t, "flat"));
        app.get("/api/flat-only", reply(&t, "flat-only"));

        let (_, _, res) = dispatch(&app, Method::GET, "/api/only-first").await;
        assert_eq!(body(&res)["tag"], "first");

        let (_, _, res) = dispatch(&app, Method::GET, "/api/shared").await;
        assert_eq!(body(&res)["tag"], "second");

        let (_, _, res) = dispatch(&app, Method::GET, "/api/flat-only").await;
        assert_eq!(body(&res)["tag"], "flat-only");

        assert!(matches!(
            app.resolve(&Method::GET, "/api/shared"),
            Resolution::Mounted { ref prefix, .. } if prefix == "/api"
        ));
        assert!(matches!(
            app.resolve(&Method::GET, "/api/flat-only"),
            Resolution::Flat(_)
        ));
    }

    #[tokio::test]
    async fn router_middleware_runs_between_global_and_route() {
        let t = trace();
        let mut router = Router::new();
        router.get("/", reply(&t, "route"));
        router.use_middleware(step(&t, "router"));

        let mut app = App::new();
        app.middleware(step(&t, "global"));
        app.mount("/r", router);

        dispatch(&app, Method::GET, "/r").await;
        assert_eq!(*t.lock().unwrap(), vec!["global", "router", "route"]);
    }

    #[tokio::test]
    async fn not_found_payload_skips_middleware_and_error_handler() {
        let t = trace();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();

        let mut app = App::new();
        app.middleware(step(&t, "global"));
        app.set_error_handler(move |_: &HandlerError, _: &RequestContext, _: &mut ResponseContext| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (outcome, _, res) = dispatch(&app, Method::DELETE, "/nowhere?x=1").await;
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(&res),
            json!({
                "success": false,
                "error": "Not Found",
                "path": "/nowhere",
                "method": "DELETE",
            })
        );
        assert!(t.lock().unwrap().is_empty());
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_halts_chain_and_runs_error_handler_once() {
        let t = trace();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();

        let mut app = App::new();
        app.middleware(step(&t, "before"));
        app.middleware(handler_fn(|_req, _res| Err(HandlerError::new("denied"))));
        app.middleware(step(&t, "after"));
        app.get("/", reply(&t, "route"));
        app.set_error_handler(
            move |err: &HandlerError, _: &RequestContext, res: &mut ResponseContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = res
                    .status(StatusCode::FORBIDDEN)
                    .json(&json!({ "custom": err.to_string() }));
            },
        );

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::ErrorHandled);
        assert_eq!(*t.lock().unwrap(), vec!["before"]);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(body(&res), json!({ "custom": "denied" }));
    }

    #[tokio::test]
    async fn panic_becomes_default_500() {
        let mut app = App::new();
        app.get("/", handler_fn(|_req, _res| panic!("boom")));

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::ErrorHandled);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(&res),
            json!({
                "success": false,
                "error": "Internal Server Error",
                "message": "boom",
            })
        );
    }

    /// Panics while building its future, before anything is polled.
    struct EagerPanic;

    impl Handler for EagerPanic {
        fn call<'a>(
            &'a self,
            _req: &'a mut RequestContext,
            _res: &'a mut ResponseContext,
        ) -> BoxFuture<'a, HandlerResult> {
            panic!("failed before returning a future")
        }
    }

    #[tokio::test]
    async fn panic_inside_call_reaches_error_handler() {
        let t = trace();
        let mut app = App::new();
        app.route(
            Method::GET,
            "/",
            [Arc::new(EagerPanic) as BoxedHandler, boxed_step(&t, "after")],
        );

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::ErrorHandled);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res)["message"], "failed before returning a future");
        assert!(t.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_handler_does_not_overwrite_sent_response() {
        let mut app = App::new();
        app.get(
            "/",
            handler_fn(|_req, res| {
                res.json(&json!({ "partial": true }))?;
                Err(HandlerError::new("late failure"))
            }),
        );

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::ErrorHandled);
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(body(&res), json!({ "partial": true }));
    }

    #[tokio::test]
    async fn continuing_past_last_handler_is_noop() {
        let t = trace();
        let mut app = App::new();
        app.get("/", step(&t, "only"));

        let (outcome, _, res) = dispatch(&app, Method::GET, "/").await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(*t.lock().unwrap(), vec!["only"]);
        assert!(!res.headers_sent());
    }

    #[tokio::test]
    async fn scoped_middleware_uses_plain_prefix_test() {
        let t = trace();
        let mut app = App::new();
        app.scoped("/admin", step(&t, "scoped"));
        app.get("/admin", reply(&t, "admin"));
        app.get("/administrators", reply(&t, "administrators"));
        app.get("/public", reply(&t, "public"));

        dispatch(&app, Method::GET, "/public").await;
        dispatch(&app, Method::GET, "/admin").await;
        dispatch(&app, Method::GET, "/administrators").await;
        assert_eq!(
            *t.lock().unwrap(),
            vec!["public", "scoped", "admin", "scoped", "administrators"]
        );
    }

    #[tokio::test]
    async fn body_parser_runs_first() {
        let mut app = App::new();
        app.post(
            "/echo",
            handler_fn(|req, res| {
                let body = req.body.clone();
                res.status(StatusCode::CREATED).json(&body)
            }),
        );

        let mut req = RequestContext::new(Method::POST, "/echo").with_body(r#"{"name":"Mira"}"#);
        let mut res = ResponseContext::new();
        app.handle(&mut req, &mut res).await;

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(body(&res), json!({ "name": "Mira" }));
    }

    #[tokio::test]
    async fn oversized_body_reaches_error_handler() {
        let mut app = App::with_body_limit(8);
        app.post("/", handler_fn(|_req, res| res.json(&json!({}))));

        let mut req = RequestContext::new(Method::POST, "/").with_body("a body longer than eight bytes");
        let mut res = ResponseContext::new();
        let outcome = app.handle(&mut req, &mut res).await;

        assert_eq!(outcome, Outcome::ErrorHandled);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn use_variants_register_in_place() {
        let t = trace();
        let mut app = App::new();
        app.using(Use::middleware(step(&t, "a")))
            .using(Use::scoped("/s", step(&t, "b")))
            .using(Use::mount("/m", Router::new()));

        // Body parser plus two global entries.
        assert_eq!(app.middleware.len(), 3);
        assert_eq!(app.mounts.len(), 1);
    }
}
