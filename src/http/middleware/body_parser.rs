//! Request body parsing.
//!
//! POST, PUT and PATCH bodies are collected and decoded as JSON. An empty
//! body becomes `{}`; text that is not JSON is kept verbatim as a string.
//! Every other method passes through without touching the body.

use axum::http::Method;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::http::handler::{Flow, Handler, HandlerError, HandlerResult};
use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;

/// Default upper bound on buffered body size (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Middleware that fills `RequestContext::body`.
#[derive(Debug, Clone)]
pub struct BodyParser {
    limit: usize,
}

impl BodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for BodyParser {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

/// Methods whose requests conventionally carry a body.
fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Decode buffered text: `{}` when empty, JSON when valid, raw text otherwise.
pub fn decode_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

impl Handler for BodyParser {
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        _res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !carries_body(&req.method) {
                return Ok(Flow::Next);
            }

            let Some(body) = req.take_raw_body() else {
                return Ok(Flow::Next);
            };

            let bytes = axum::body::to_bytes(body, self.limit)
                .await
                .map_err(HandlerError::Stream)?;
            let text = String::from_utf8_lossy(&bytes);
            req.body = decode_body(&text);

            tracing::trace!(bytes = bytes.len(), "Request body parsed");
            Ok(Flow::Next)
        })
    }
}
