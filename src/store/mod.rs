//! Flat-file JSON persistence.
//!
//! # Data Flow
//! ```text
//! Resource controller
//!     → file_store.rs (read-modify-write under a mutex)
//!     → <data_dir>/<resource>.json (pretty JSON array of objects)
//! ```
//!
//! # Design Decisions
//! - One file per resource, whole file rewritten on every change
//! - Numeric `id` assigned as max + 1
//! - A missing file reads as an empty collection

pub mod file_store;

pub use file_store::{run_blocking, FileStore, Record, StoreError};
