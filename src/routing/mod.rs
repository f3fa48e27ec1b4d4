//! Routing and dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     App::using / App::get.. / Router::get..
//!     → flat exact table, mount list, per-router tables
//!     → frozen behind Arc<App>
//!
//! Incoming request (method, pathname)
//!     → dispatcher.rs (mounted routers first, then flat table)
//!     → router.rs (exact key, then ordered pattern scan)
//!     → matcher.rs (segment-wise pattern match, param binding)
//!     → Return: handler chain + params, or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod dispatcher;
pub mod matcher;
pub mod router;

pub use dispatcher::{default_error_handler, App, Outcome, Resolution, Use};
pub use matcher::{Params, PathPattern};
pub use router::{Mountable, RouteKey, RouteMatch, Router};
