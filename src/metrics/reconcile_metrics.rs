//! Reconciliation metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for the live-update watch loops.
///
/// Every recording is tagged with the watched section's base key so pushes on the
/// private and common sections can be told apart.
///
/// # Examples
///
/// ```rust,no_run
/// use layered_config::metrics::ReconcileMetrics;
/// use opentelemetry::global;
///
/// let metrics = ReconcileMetrics::new(global::meter("layered-config"));
///
/// let timer = metrics.start_update("edgex/v3/core-data/Writable");
/// // ... merge and dispatch ...
/// metrics.record_applied("edgex/v3/core-data/Writable", timer);
/// ```
#[derive(Clone)]
pub struct ReconcileMetrics {
    updates_received: Counter<u64>,
    updates_applied: Counter<u64>,
    updates_suppressed: Counter<u64>,
    watch_errors: Counter<u64>,
    apply_duration: Histogram<f64>,
}

impl ReconcileMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let updates_received = meter
            .u64_counter("layered_config.updates.received")
            .with_description("Provider pushes received by the watch loops")
            .build();

        let updates_applied = meter
            .u64_counter("layered_config.updates.applied")
            .with_description("Writable changes merged into the service configuration")
            .build();

        let updates_suppressed = meter
            .u64_counter("layered_config.updates.suppressed")
            .with_description("Common changes ignored because a private setting overrides them")
            .build();

        let watch_errors = meter
            .u64_counter("layered_config.watch.errors")
            .with_description("Transport errors reported by the provider watch")
            .build();

        let apply_duration = meter
            .f64_histogram("layered_config.updates.duration")
            .with_description("Time spent merging and dispatching a writable change")
            .with_unit("s")
            .build();

        Self {
            updates_received,
            updates_applied,
            updates_suppressed,
            watch_errors,
            apply_duration,
        }
    }

    /// Count a received push and start timing its handling.
    pub fn start_update(&self, section: &str) -> Instant {
        self.updates_received.add(1, &[section_attr(section)]);
        Instant::now()
    }

    /// Record a change that was merged into the configuration.
    pub fn record_applied(&self, section: &str, start: Instant) {
        let attrs = [section_attr(section)];
        self.updates_applied.add(1, &attrs);
        self.apply_duration.record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Record a common change that lost to a private override.
    pub fn record_suppressed(&self, section: &str) {
        self.updates_suppressed.add(1, &[section_attr(section)]);
    }

    /// Record a transport error from the provider watch.
    pub fn record_watch_error(&self, section: &str) {
        self.watch_errors.add(1, &[section_attr(section)]);
    }
}

fn section_attr(section: &str) -> KeyValue {
    KeyValue::new("section", section.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_recording() {
        let metrics = ReconcileMetrics::new(global::meter("test"));
        let section = "edgex/v3/core-data/Writable";

        let timer = metrics.start_update(section);
        metrics.record_applied(section, timer);
        metrics.record_suppressed(section);
        metrics.record_watch_error(section);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = ReconcileMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        let timer1 = metrics.start_update("a");
        let timer2 = metrics2.start_update("b");

        metrics.record_applied("a", timer1);
        metrics2.record_applied("b", timer2);
    }
}
