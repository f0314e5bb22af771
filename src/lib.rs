//! PyPack Mirror Library
//!
//! A caching mirror for PyPI-style simple indexes. Project listings merge the
//! locally stored artifacts with the live upstream listing; artifact downloads
//! are fetched from their origin once and served from local storage after that.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod server;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
