//! Express-style routing on top of axum.
//!
//! Handlers form chains: middleware runs in registration order, mounted
//! routers see prefix-stripped paths, and an error handler catches what a
//! chain reports or panics with.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resources;
pub mod routing;
pub mod store;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{App, Router, Use};
