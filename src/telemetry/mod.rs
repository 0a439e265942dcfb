//! Telemetry
//!
//! Structured logging setup. Library code emits `tracing` events; binaries
//! install a subscriber through [`init_logging`] or [`LoggingConfig`].

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, DEFAULT_DIRECTIVE};
