//! Builder for constructing Processor instances.

use crate::core::watch::LoopMetrics;
use crate::core::{BootstrapOptions, Processor, WritableDispatcher};
use crate::error::Result;
use crate::metrics::MetricsManager;
use crate::notify::{CancelSignal, UpdateNotifier};
use crate::observability::{LoggingClient, NoopLogging};
use crate::provider::{ProviderFactory, ProviderInfo};
use crate::secrets::SecretProvider;
use crate::sources::{EnvOverrides, Overrides};
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::ReconcileMetrics;

/// Builder for constructing a [`Processor`].
///
/// Every collaborator is optional. Without a provider factory only file-backed
/// resolution is possible; without a logging client log levels are validated but not
/// applied; environment overrides default to unprefixed variables with `_` between
/// path segments.
///
/// # Examples
///
/// ```rust
/// use layered_config::prelude::*;
/// use std::sync::Arc;
///
/// let options = BootstrapOptions {
///     config_provider_url: Some("consul.http://localhost:8500".to_string()),
///     ..Default::default()
/// };
///
/// let processor = Processor::builder()
///     .with_options(options)
///     .with_provider_factory(MemoryProvider::new())
///     .with_overrides(EnvOverrides::new().with_prefix("EDGEX"))
///     .with_logging(Arc::new(NoopLogging))
///     .build()
///     .unwrap();
///
/// assert!(processor.provider_info().use_provider());
/// ```
pub struct ProcessorBuilder {
    options: BootstrapOptions,
    factory: Option<Arc<dyn ProviderFactory>>,
    overrides: Arc<dyn Overrides>,
    logging: Arc<dyn LoggingClient>,
    secret_provider: Option<Arc<dyn SecretProvider>>,
    metrics_manager: Option<Arc<dyn MetricsManager>>,
    notifier: UpdateNotifier,
    cancel: CancelSignal,
    #[cfg(feature = "metrics")]
    reconcile_metrics: Option<ReconcileMetrics>,
}

impl ProcessorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            options: BootstrapOptions::default(),
            factory: None,
            overrides: Arc::new(EnvOverrides::new()),
            logging: Arc::new(NoopLogging),
            secret_provider: None,
            metrics_manager: None,
            notifier: UpdateNotifier::new(),
            cancel: CancelSignal::new(),
            #[cfg(feature = "metrics")]
            reconcile_metrics: None,
        }
    }

    /// Use these bootstrap options.
    pub fn with_options(mut self, options: BootstrapOptions) -> Self {
        self.options = options;
        self
    }

    /// Create provider clients with `factory`.
    pub fn with_provider_factory<F: ProviderFactory + 'static>(mut self, factory: F) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Apply these overrides to file-loaded configuration.
    pub fn with_overrides<O: Overrides + 'static>(mut self, overrides: O) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    /// Set the log threshold through `logging`.
    pub fn with_logging(mut self, logging: Arc<dyn LoggingClient>) -> Self {
        self.logging = logging;
        self
    }

    /// Fetch provider access tokens from, and report rotated secrets to, `secrets`.
    pub fn with_secret_provider(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.secret_provider = Some(secrets);
        self
    }

    /// Reset the reporting interval of `metrics` when the telemetry interval changes.
    pub fn with_metrics_manager(mut self, metrics: Arc<dyn MetricsManager>) -> Self {
        self.metrics_manager = Some(metrics);
        self
    }

    /// Raise unhandled writable changes on `notifier`.
    pub fn with_update_notifier(mut self, notifier: UpdateNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Stop on `cancel` instead of a signal owned by the processor.
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Record what the watch loops do with each provider push.
    #[cfg(feature = "metrics")]
    pub fn with_reconcile_metrics(mut self, metrics: ReconcileMetrics) -> Self {
        self.reconcile_metrics = Some(metrics);
        self
    }

    /// Build the processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider URL in the options is malformed.
    pub fn build(self) -> Result<Processor> {
        let provider_info = ProviderInfo::from_url(self.options.config_provider_url.as_deref().unwrap_or(""))?;

        let mut dispatcher = WritableDispatcher::new(Arc::clone(&self.logging)).with_notifier(self.notifier);
        if let Some(secrets) = &self.secret_provider {
            dispatcher = dispatcher.with_secret_provider(Arc::clone(secrets));
        }
        if let Some(metrics) = self.metrics_manager {
            dispatcher = dispatcher.with_metrics_manager(metrics);
        }

        #[cfg(feature = "metrics")]
        let metrics = LoopMetrics::new(self.reconcile_metrics);
        #[cfg(not(feature = "metrics"))]
        let metrics = LoopMetrics::default();

        Ok(Processor::from_parts(
            self.options,
            provider_info,
            self.factory,
            self.overrides,
            self.logging,
            self.secret_provider,
            dispatcher,
            self.cancel,
            metrics,
        ))
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
