//! Response context adapter.
//!
//! # Responsibilities
//! - Hold the status code (default 200) until a body is emitted
//! - Serialize payloads as JSON or text and finalize the response
//! - Convert the finalized context into an axum response
//!
//! # Design Decisions
//! - Emitting a body returns `Ok(Flow::Done)` so handlers can `return res.json(..)`
//! - The first emission wins; a second one is dropped with a warning

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::http::handler::{Flow, HandlerResult};

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_HTML: &str = "text/html";

/// Per-request response under construction.
#[derive(Debug)]
pub struct ResponseContext {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ResponseContext {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set the status code for the upcoming emission. Ignored once sent.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        if !self.headers_sent() {
            self.status = status;
        }
        self
    }

    /// Current status code.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Whether a body has already been emitted.
    pub fn headers_sent(&self) -> bool {
        self.body.is_some()
    }

    /// Emit `data` as text when it serializes to a JSON string, as JSON otherwise.
    pub fn send<T: Serialize + ?Sized>(&mut self, data: &T) -> HandlerResult {
        match serde_json::to_value(data)? {
            Value::String(text) => self.finish(CONTENT_TYPE_HTML, Bytes::from(text)),
            other => {
                let encoded = serde_json::to_vec(&other)?;
                self.finish(CONTENT_TYPE_JSON, Bytes::from(encoded))
            }
        }
    }

    /// Emit `data` as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> HandlerResult {
        let encoded = serde_json::to_vec(data)?;
        self.finish(CONTENT_TYPE_JSON, Bytes::from(encoded))
    }

    /// Body bytes emitted so far, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Emitted body parsed back as JSON. Test and logging helper.
    pub fn body_json(&self) -> Option<Value> {
        self.body.as_ref().and_then(|b| serde_json::from_slice(b).ok())
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn finish(&mut self, content_type: &'static str, body: Bytes) -> HandlerResult {
        if self.headers_sent() {
            tracing::warn!(status = %self.status, "Response already sent, dropping second write");
            return Ok(Flow::Done);
        }
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(body);
        Ok(Flow::Done)
    }
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for ResponseContext {
    fn into_response(self) -> Response {
        let body = match self.body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_200_and_unsent() {
        let res = ResponseContext::new();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(!res.headers_sent());
        assert!(res.body().is_none());
    }

    #[test]
    fn status_chains_into_json() {
        let mut res = ResponseContext::new();
        let flow = res
            .status(StatusCode::CREATED)
            .json(&json!({ "success": true }))
            .unwrap();

        assert_eq!(flow, Flow::Done);
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[header::CONTENT_TYPE], CONTENT_TYPE_JSON);
        assert_eq!(res.body_json(), Some(json!({ "success": true })));
    }

    #[test]
    fn send_string_is_html() {
        let mut res = ResponseContext::new();
        res.send("hello").unwrap();
        assert_eq!(res.headers()[header::CONTENT_TYPE], CONTENT_TYPE_HTML);
        assert_eq!(res.body(), Some(&b"hello"[..]));
    }

    #[test]
    fn send_object_is_json() {
        let mut res = ResponseContext::new();
        res.send(&json!({ "a": 1 })).unwrap();
        assert_eq!(res.headers()[header::CONTENT_TYPE], CONTENT_TYPE_JSON);
        assert_eq!(res.body(), Some(&br#"{"a":1}"#[..]));
    }

    #[test]
    fn json_string_is_quoted() {
        let mut res = ResponseContext::new();
        res.json("hello").unwrap();
        assert_eq!(res.body(), Some(&br#""hello""#[..]));
    }

    #[test]
    fn second_write_is_dropped() {
        let mut res = ResponseContext::new();
        res.json(&json!({ "first": true })).unwrap();
        res.status(StatusCode::INTERNAL_SERVER_ERROR)
            .json(&json!({ "second": true }))
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body_json(), Some(json!({ "first": true })));
    }

    #[test]
    fn converts_into_axum_response() {
        let mut res = ResponseContext::new();
        res.status(StatusCode::NOT_FOUND).json(&json!({})).unwrap();
        let response = res.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE_JSON);
    }
}
