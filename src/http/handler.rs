//! Handler contract shared by middleware, route handlers and the dispatcher.
//!
//! # Responsibilities
//! - Define the `Handler` trait every chain link implements
//! - Define the outcome a handler reports back to the dispatcher
//! - Define the error handler contract
//!
//! # Design Decisions
//! - A handler never holds a continuation; it returns `Flow::Next` and the
//!   dispatcher advances its own cursor
//! - `Err(HandlerError)` is the error continuation: the chain stops there
//! - Plain closures are handlers through blanket impls

use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;

/// What a handler tells the dispatcher once it has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next handler in the chain.
    Next,
    /// The response is finalized; stop here.
    Done,
}

/// Result every handler produces.
pub type HandlerResult = Result<Flow, HandlerError>;

/// Errors that abort a handler chain and reach the error handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Failure reported by a handler.
    #[error("{0}")]
    Message(String),

    /// A handler panicked; carries the panic message.
    #[error("{0}")]
    Panic(String),

    /// The request body stream failed while it was being read.
    #[error("request body stream failed: {0}")]
    Stream(#[source] axum::Error),

    /// A response payload could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HandlerError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::Panic(message)
    }
}

/// A link in a handler chain: middleware or terminal route handler.
pub trait Handler: Send + Sync + 'static {
    /// Process the request. Returning `Flow::Next` hands control to the next
    /// link; writing a response and returning `Flow::Done` completes it.
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// Shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult> {
        // Deferred into the future so panics surface while polling.
        Box::pin(async move { self(req, res) })
    }
}

/// Wrap any handler into a `BoxedHandler`.
pub fn boxed<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

/// Pin a closure to the synchronous handler signature so its argument
/// types are inferred without annotations.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&mut RequestContext, &mut ResponseContext) -> HandlerResult + Send + Sync + 'static,
{
    f
}

/// Receives the error that stopped a chain. Invoked at most once per request.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, err: &HandlerError, req: &RequestContext, res: &mut ResponseContext);
}

impl<F> ErrorHandler for F
where
    F: Fn(&HandlerError, &RequestContext, &mut ResponseContext) + Send + Sync + 'static,
{
    fn handle(&self, err: &HandlerError, req: &RequestContext, res: &mut ResponseContext) {
        self(err, req, res)
    }
}
