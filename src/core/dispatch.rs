//! Side effects of a writable configuration change.

use crate::core::{Configuration, parse_duration};
use crate::metrics::MetricsManager;
use crate::notify::UpdateNotifier;
use crate::observability::LoggingClient;
use crate::secrets::{InsecureSecrets, SecretProvider, secret_names_changed};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Which side effect a writable change triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The log threshold was re-applied with this level.
    LogLevel(String),
    /// These secret names were reported to the secret subsystem.
    InsecureSecrets(Vec<String>),
    /// The telemetry interval changed. `None` when the new value could not be applied.
    TelemetryInterval(Option<Duration>),
    /// Nothing built in handled the change; subscribers were notified.
    Notified,
}

/// Reacts to a merged writable change with at most one side effect.
///
/// Checked in order: log level, insecure secrets, telemetry interval. The first field
/// that differs wins and later ones are not examined; when none differ the generic
/// update notification fires.
#[derive(Clone)]
pub struct WritableDispatcher {
    logging: Arc<dyn LoggingClient>,
    secrets: Option<Arc<dyn SecretProvider>>,
    metrics: Option<Arc<dyn MetricsManager>>,
    notifier: UpdateNotifier,
}

impl WritableDispatcher {
    /// Create a dispatcher that adjusts logging through `logging`.
    pub fn new(logging: Arc<dyn LoggingClient>) -> Self {
        Self {
            logging,
            secrets: None,
            metrics: None,
            notifier: UpdateNotifier::new(),
        }
    }

    /// Report rotated secrets to `secrets`.
    pub fn with_secret_provider(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Reset the reporting interval of `metrics` when the telemetry interval changes.
    pub fn with_metrics_manager(mut self, metrics: Arc<dyn MetricsManager>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Raise unhandled changes on `notifier`.
    pub fn with_notifier(mut self, notifier: UpdateNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// The notifier raised for unhandled changes.
    pub fn notifier(&self) -> &UpdateNotifier {
        &self.notifier
    }

    /// Compare `previous` and `current` and fire the matching side effect.
    pub fn dispatch<C: Configuration>(&self, previous: &C, current: &C) -> DispatchOutcome {
        if current.log_level() != previous.log_level() {
            let level = current.log_level().to_string();
            if let Err(e) = self.logging.set_log_level(&level) {
                error!(level = %level, error = %e, "Failed to apply changed log level");
            } else {
                info!(level = %level, "Logging level changed");
            }
            return DispatchOutcome::LogLevel(level);
        }

        if let Some(current_secrets) = current.insecure_secrets() {
            let empty = InsecureSecrets::new();
            let previous_secrets = previous.insecure_secrets().unwrap_or(&empty);
            if current_secrets != previous_secrets {
                info!("Insecure secrets have been updated");
                let names = secret_names_changed(previous_secrets, current_secrets);
                if let Some(secrets) = &self.secrets {
                    for name in &names {
                        secrets.secret_updated_at_secret_name(name);
                    }
                }
                return DispatchOutcome::InsecureSecrets(names);
            }
        }

        if current.telemetry_interval() != previous.telemetry_interval() {
            info!("Telemetry interval has been updated. Processing new value...");
            return DispatchOutcome::TelemetryInterval(self.reset_telemetry_interval(current.telemetry_interval()));
        }

        self.notifier.notify_all();
        DispatchOutcome::Notified
    }

    fn reset_telemetry_interval(&self, raw: &str) -> Option<Duration> {
        let mut interval = match parse_duration(raw) {
            Ok(interval) => interval,
            Err(e) => {
                error!(error = %e, "Updated telemetry interval is not a valid duration, using previous value");
                return None;
            }
        };

        if interval.is_zero() {
            info!("0 specified for metrics reporting interval. Setting to max duration to effectively disable reporting");
            interval = Duration::MAX;
        }

        let Some(metrics) = &self.metrics else {
            error!("Metrics manager not available while updating telemetry interval");
            return None;
        };
        metrics.reset_interval(interval);
        Some(interval)
    }
}
