//! Request context adapter.
//!
//! # Responsibilities
//! - Parse the request URI into a pathname and query map, once
//! - Start every request with empty params and an empty JSON body
//! - Keep the raw body stream until the body parser consumes it
//!
//! # Design Decisions
//! - Query values are percent-decoded; repeated keys keep the last value
//! - Path segments are never decoded (route matching is byte-exact)

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request};
use serde_json::{Map, Value};

/// Per-request state visible to every handler in the chain.
#[derive(Debug)]
pub struct RequestContext {
    /// HTTP method.
    pub method: Method,
    /// Raw request target as received (path and query).
    pub url: String,
    /// Path component of the URL.
    pub pathname: String,
    /// Decoded query string pairs.
    pub query: HashMap<String, String>,
    /// Route parameters bound during resolution.
    pub params: HashMap<String, String>,
    /// Parsed request body; `{}` until the body parser runs.
    pub body: Value,
    /// Request headers.
    pub headers: HeaderMap,
    raw_body: Option<Body>,
}

impl RequestContext {
    /// Adapt an inbound axum request.
    pub fn from_request(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let uri = &parts.uri;
        let pathname = match uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| pathname.clone());

        Self {
            method: parts.method,
            url,
            pathname,
            query: uri.query().map(parse_query).unwrap_or_default(),
            params: HashMap::new(),
            body: Value::Object(Map::new()),
            headers: parts.headers,
            raw_body: Some(body),
        }
    }

    /// Build a context from a method and request target without a body.
    pub fn new(method: Method, target: &str) -> Self {
        let (pathname, query) = parse_target(target);
        Self {
            method,
            url: target.to_string(),
            pathname,
            query,
            params: HashMap::new(),
            body: Value::Object(Map::new()),
            headers: HeaderMap::new(),
            raw_body: None,
        }
    }

    /// Attach a raw body stream.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    /// Look up a route parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Take the raw body stream. Returns `None` once consumed.
    pub fn take_raw_body(&mut self) -> Option<Body> {
        self.raw_body.take()
    }
}

/// Split a request target into pathname and decoded query pairs.
fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    let target = target.split('#').next().unwrap_or_default();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    // Absolute-form: scheme and authority precede the path.
    let path = match path.find("://") {
        Some(scheme_end) if !path.starts_with('/') => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map_or("", |idx| &rest[idx..])
        }
        _ => path,
    };

    let pathname = if path.is_empty() { "/".to_string() } else { path.to_string() };
    (pathname, query.map(parse_query).unwrap_or_default())
}

/// Decode `a=1&b=2` pairs; repeated keys keep the last value.
fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_query() {
        let req = RequestContext::new(Method::GET, "/performers?sort=name&limit=10");
        assert_eq!(req.pathname, "/performers");
        assert_eq!(req.query.get("sort").map(String::as_str), Some("name"));
        assert_eq!(req.query.get("limit").map(String::as_str), Some("10"));
        assert!(req.params.is_empty());
        assert_eq!(req.body, Value::Object(Map::new()));
    }

    #[test]
    fn decodes_query_but_not_path() {
        let req = RequestContext::new(Method::GET, "/a%20b?q=hello%20world&x=1+2");
        assert_eq!(req.pathname, "/a%20b");
        assert_eq!(req.query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(req.query.get("x").map(String::as_str), Some("1 2"));
    }

    #[test]
    fn repeated_query_key_keeps_last() {
        let req = RequestContext::new(Method::GET, "/?tag=a&tag=b");
        assert_eq!(req.query.get("tag").map(String::as_str), Some("b"));
    }

    #[test]
    fn absolute_target_is_reduced_to_path() {
        let req = RequestContext::new(Method::GET, "http://example.com/brands?x=1");
        assert_eq!(req.pathname, "/brands");
        assert_eq!(req.query.len(), 1);

        let req = RequestContext::new(Method::GET, "http://example.com");
        assert_eq!(req.pathname, "/");
    }

    #[test]
    fn url_inside_query_does_not_change_path() {
        let req = RequestContext::new(Method::GET, "/performers?ref=http://example.com/brands");
        assert_eq!(req.pathname, "/performers");
        assert_eq!(
            req.query.get("ref").map(String::as_str),
            Some("http://example.com/brands")
        );

        let req = RequestContext::new(Method::GET, "http://example.com?next=https://x.io/hotels/3");
        assert_eq!(req.pathname, "/");
        assert_eq!(
            req.query.get("next").map(String::as_str),
            Some("https://x.io/hotels/3")
        );
    }

    #[test]
    fn adapted_request_keeps_path_with_url_in_query() {
        let request = Request::builder()
            .uri("/performers?next=https://x.io/hotels/3")
            .body(Body::empty())
            .unwrap();

        let req = RequestContext::from_request(request);
        assert_eq!(req.pathname, "/performers");
        assert_eq!(req.url, "/performers?next=https://x.io/hotels/3");
        assert_eq!(
            req.query.get("next").map(String::as_str),
            Some("https://x.io/hotels/3")
        );
    }

    #[test]
    fn adapts_axum_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/hotels/3?verbose=true")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let mut req = RequestContext::from_request(request);
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.url, "/hotels/3?verbose=true");
        assert_eq!(req.pathname, "/hotels/3");
        assert!(req.headers.contains_key("content-type"));
        assert!(req.take_raw_body().is_some());
        assert!(req.take_raw_body().is_none());
    }
}
