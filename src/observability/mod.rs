//! Logging for the resolution and reconciliation engine.
//!
//! All components log through `tracing`. The process threshold is owned by a
//! [`LoggingClient`], which the orchestrator sets once configuration is resolved and
//! the dispatcher updates whenever `Writable.LogLevel` changes.

pub mod logging;

pub use logging::{LoggingClient, NoopLogging, TracingLogLevel, init_logging, parse_level};
