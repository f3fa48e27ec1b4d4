//! Request logging middleware.

use futures_util::future::BoxFuture;

use crate::http::handler::{Flow, Handler, HandlerResult};
use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;

/// Logs method and URL of every dispatched request, then continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog;

impl Handler for RequestLog {
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        _res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult> {
        tracing::info!(method = %req.method, url = %req.url, "Request");
        Box::pin(futures_util::future::ready(Ok(Flow::Next)))
    }
}
