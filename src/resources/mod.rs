//! Demo REST resources served on top of the dispatcher.
//!
//! # Data Flow
//! ```text
//! App (request log → body parser)
//!     → /concerts, /artists, /tours, /hotels, /products, /brands, /shows,
//!       /performers (controller.rs router each)
//!     → FileStore (<data_dir>/<resource>.json), read and written on the
//!       blocking pool
//! ```
//!
//! # Design Decisions
//! - One generic controller; resources differ only by their `ResourceSpec`
//! - Mount order follows `catalog::ALL`

pub mod catalog;
pub mod controller;

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::ServerConfig;
use crate::http::handler::handler_fn;
use crate::http::middleware::RequestLog;
use crate::routing::App;
use crate::store::FileStore;

pub use controller::{router, ResourceSpec};

/// Name and version reported by the index route.
pub const API_NAME: &str = "Route Chain Demo API";
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the demo application.
pub fn build_app(config: &ServerConfig) -> App {
    let data_dir = Path::new(&config.storage.data_dir);
    let mut app = App::with_body_limit(config.limits.max_body_bytes);

    app.middleware(RequestLog);

    let mut endpoints = Map::new();
    for spec in catalog::ALL {
        let prefix = format!("/{}", spec.name);
        let store = Arc::new(FileStore::new(data_dir, &spec.file_name()));
        tracing::debug!(prefix = %prefix, file = %store.path().display(), "Mounting resource");

        app.mount(&prefix, router(spec, store));
        endpoints.insert(spec.name.to_string(), Value::String(prefix));
    }

    let index = json!({
        "message": API_NAME,
        "version": API_VERSION,
        "endpoints": endpoints,
    });
    app.get("/", handler_fn(move |_req, res| res.json(&index)));

    app
}
