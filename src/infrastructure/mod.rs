//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Process groups and shutdown signals

pub mod config;
pub mod logging;
pub mod process;
