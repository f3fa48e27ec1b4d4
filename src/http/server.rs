//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum router with a single catch-all dispatch handler
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Adapt each request into the dispatcher's contexts and back
//! - Serve until a shutdown signal arrives
//!
//! # Design Decisions
//! - axum only carries bytes; all routing happens in `routing::App`
//! - The `App` is frozen behind an `Arc` before the first request

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;
use crate::lifecycle::{shutdown, signals};
use crate::observability::metrics;
use crate::routing::{App, Outcome};

/// Header carrying the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request id when the client sent none.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// HTTP server driving an `App`.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving `app`.
    pub fn new(config: ServerConfig, app: App) -> Self {
        let router = Self::build_router(&config, Arc::new(app));
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, app: Arc<App>) -> Router {
        Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(app)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    // Outside the timeout: `TimeoutLayer` needs a `Default` response body.
                    .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// The fully layered axum router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until Ctrl+C, SIGTERM, or a `Shutdown` trigger.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signals::shutdown_signal() => {},
                    _ = shutdown::wait(shutdown_rx) => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Catch-all handler: adapt, dispatch, convert back.
async fn dispatch_handler(State(app): State<Arc<App>>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let mut req = RequestContext::from_request(request);
    let mut res = ResponseContext::new();

    let outcome = app.handle(&mut req, &mut res).await;
    if outcome == Outcome::Completed && !res.headers_sent() {
        tracing::warn!(
            method = %req.method,
            path = %req.pathname,
            "Handler chain ended without writing a response"
        );
    }

    metrics::record_request(req.method.as_str(), res.status_code().as_u16(), start);
    res.into_response()
}
