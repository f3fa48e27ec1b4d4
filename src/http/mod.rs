//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, layers, catch-all dispatch)
//!     → request.rs (parse URL, empty params/body)
//!     → [routing::App resolves and runs the handler chain]
//!     → response.rs (status, JSON/text body)
//!     → Send to client
//! ```

pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{boxed, handler_fn, BoxedHandler, ErrorHandler, Flow, Handler, HandlerError, HandlerResult};
pub use request::RequestContext;
pub use response::ResponseContext;
pub use server::HttpServer;
