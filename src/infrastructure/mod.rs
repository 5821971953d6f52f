//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Run artifact persistence

pub mod artifacts;
pub mod config;
pub mod logging;
