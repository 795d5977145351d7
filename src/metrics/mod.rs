//! Metrics subsystem capability and reconciliation metrics.
//!
//! The [`MetricsManager`] trait is the hook the writable dispatcher uses when the
//! telemetry interval changes. With the `metrics` feature enabled,
//! [`ReconcileMetrics`] records what the watch loops do with each provider push:
//!
//! - Pushes received per section
//! - Changes applied
//! - Changes suppressed by a private override
//! - Transport errors
//!
//! # Examples
//!
//! ```rust,ignore
//! use layered_config::metrics::ReconcileMetrics;
//! use opentelemetry::global;
//!
//! let metrics = ReconcileMetrics::new(global::meter("my-service"));
//! let processor = Processor::builder().with_reconcile_metrics(metrics).build();
//! ```

use std::time::Duration;

#[cfg(feature = "metrics")]
mod reconcile_metrics;

#[cfg(feature = "metrics")]
pub use reconcile_metrics::ReconcileMetrics;

/// The part of the metrics subsystem the reconciler talks to.
pub trait MetricsManager: Send + Sync {
    /// Reset the periodic reporting interval.
    ///
    /// `Duration::MAX` means reporting is effectively disabled.
    fn reset_interval(&self, interval: Duration);
}
