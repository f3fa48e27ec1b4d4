//! Built-in middleware.
//!
//! - `body_parser`: buffers and decodes bodies of mutating requests
//! - `request_log`: one log line per dispatched request

pub mod body_parser;
pub mod request_log;

pub use body_parser::BodyParser;
pub use request_log::RequestLog;
