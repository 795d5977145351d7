//! # layered-config
//!
//! Layered service configuration with live reconciliation of writable settings.
//!
//! ## Overview
//!
//! `layered-config` resolves a microservice's effective configuration from:
//! - Common defaults shared by all services
//! - Defaults for the service type (application or device services)
//! - The service's private configuration file
//! - Environment variable overrides
//! - A remote key/value configuration provider
//!
//! Once resolved, the `Writable` section stays synchronized with the provider for the
//! life of the process. One watch loop per section diffs each push, lets private
//! settings shadow common ones, merges approved changes, and fires at most one side
//! effect per change (log level, secret rotation, or telemetry interval).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layered_config::prelude::*;
//! use layered_config::secrets::InsecureSecrets;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! #[serde(rename_all = "PascalCase", deny_unknown_fields)]
//! struct Writable {
//!     log_level: String,
//! }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! #[serde(rename_all = "PascalCase", deny_unknown_fields)]
//! struct ServiceConfig {
//!     writable: Writable,
//! }
//!
//! impl Configuration for ServiceConfig {
//!     type Writable = Writable;
//!     fn log_level(&self) -> &str { &self.writable.log_level }
//!     fn telemetry_interval(&self) -> &str { "" }
//!     fn insecure_secrets(&self) -> Option<&InsecureSecrets> { None }
//!     fn writable(&self) -> &Writable { &self.writable }
//!     fn writable_mut(&mut self) -> &mut Writable { &mut self.writable }
//! }
//!
//! # async fn example() -> layered_config::error::Result<()> {
//! let logging = init_logging("INFO")?;
//!
//! let processor = Processor::builder()
//!     .with_options(BootstrapOptions::from_env("EDGEX")?)
//!     .with_logging(std::sync::Arc::new(logging))
//!     .build()?;
//!
//! let config = processor
//!     .process("core-data", ServiceType::Other, "edgex/v3", ServiceConfig::default())
//!     .await?;
//!
//! // Lock-free snapshot, updated by the watch loops
//! println!("Log level: {}", config.get().log_level());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml` (default), `toml`, `json`: configuration file formats
//! - `metrics`: OpenTelemetry counters for the watch loops

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod observability;
pub mod provider;
pub mod secrets;
pub mod sources;
pub mod tree;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        BootstrapOptions, Configuration, Processor, ProcessorBuilder, ServiceType, SharedConfig,
    };
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{CancelSignal, UpdateNotifier};
    pub use crate::observability::{LoggingClient, NoopLogging, init_logging};
    pub use crate::provider::{MemoryProvider, ProviderClient, ProviderFactory};
    pub use crate::sources::EnvOverrides;
    pub use crate::tree::{ConfigTree, ConfigValue};
}
