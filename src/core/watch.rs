//! Live-update watch loops.
//!
//! One loop runs per watched section until the cancellation signal fires. Every loop
//! discards the provider's initial push. Private writable changes always apply;
//! common writable changes apply only when the private section does not override
//! the changed key.

use crate::core::{Configuration, DispatchOutcome, SharedConfig, WRITABLE_KEY, WritableDispatcher};
use crate::error::ConfigError;
use crate::notify::CancelSignal;
use crate::provider::{ProviderClient, WatchStreams};
use crate::tree::{ConfigTree, KeyPath, KeySet, build_base_key, diff, filter_tree, merge_values};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ReconcileMetrics;

/// Optional reconciliation metrics, free when the `metrics` feature is off.
#[derive(Clone, Default)]
pub(crate) struct LoopMetrics {
    #[cfg(feature = "metrics")]
    inner: Option<ReconcileMetrics>,
}

impl LoopMetrics {
    #[cfg(feature = "metrics")]
    pub(crate) fn new(inner: Option<ReconcileMetrics>) -> Self {
        Self { inner }
    }

    fn received(&self, _section: &str) -> Instant {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.inner {
            return m.start_update(_section);
        }
        Instant::now()
    }

    fn applied(&self, _section: &str, _start: Instant) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.inner {
            m.record_applied(_section, _start);
        }
    }

    fn suppressed(&self, _section: &str) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.inner {
            m.record_suppressed(_section);
        }
    }

    fn watch_error(&self, _section: &str) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.inner {
            m.record_watch_error(_section);
        }
    }
}

/// Everything a writable watch loop needs besides its provider clients.
pub(crate) struct WatchContext<C> {
    pub(crate) shared: SharedConfig<C>,
    pub(crate) dispatcher: WritableDispatcher,
    pub(crate) cancel: CancelSignal,
    pub(crate) metrics: LoopMetrics,
}

impl<C> Clone for WatchContext<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

enum Event {
    Cancelled,
    Error(ConfigError),
    Update(ConfigTree),
    Closed,
}

async fn next_event(streams: &mut WatchStreams, cancel: &CancelSignal) -> Event {
    tokio::select! {
        _ = cancel.cancelled() => Event::Cancelled,
        Some(err) = streams.errors.recv() => Event::Error(err),
        update = streams.updates.recv() => match update {
            Some(raw) => Event::Update(raw),
            None => Event::Closed,
        },
    }
}

async fn subscribe(client: &dyn ProviderClient, section: &str) -> Option<WatchStreams> {
    match client.watch_for_changes(section).await {
        Ok(streams) => Some(streams),
        Err(e) => {
            error!(section = section, error = %e, "Failed to watch for configuration changes");
            None
        }
    }
}

/// Strip settings from a pushed writable snapshot that the provider does not store.
///
/// `None` when the stored keys could not be listed.
async fn filter_writable(client: &dyn ProviderClient, raw: ConfigTree, section_key: &str) -> Option<ConfigTree> {
    match client.get_configuration_keys(WRITABLE_KEY).await {
        Ok(keys) => Some(filter_tree(raw, section_key, &keys.into_iter().collect::<KeySet>())),
        Err(e) => {
            error!(section = section_key, error = %e, "Failed to list configuration keys");
            None
        }
    }
}

/// Merge `overlay` into the writable sub-structure and dispatch the side effect.
pub(crate) fn apply_writable_update<C: Configuration>(
    ctx: &WatchContext<C>,
    overlay: &ConfigTree,
) -> Option<DispatchOutcome> {
    // Dispatch under the write gate so side effects land in the order of the merges.
    let applied = ctx.shared.update_then(
        |config| merge_values(config.writable_mut(), overlay),
        |updated| {
            info!("Writable configuration has been updated from the configuration provider");
            ctx.dispatcher.dispatch(updated.previous.as_ref(), updated.current.as_ref())
        },
    );
    match applied {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(error = %e, "Failed to apply writable change to service configuration");
            None
        }
    }
}

/// Watch the service's own writable section. `base_key` is `{stem}/{service key}`.
pub(crate) async fn listen_for_private_changes<C: Configuration>(
    ctx: WatchContext<C>,
    client: Arc<dyn ProviderClient>,
    base_key: String,
) {
    let section_key = build_base_key(&[&base_key, WRITABLE_KEY]);
    let Some(mut streams) = subscribe(client.as_ref(), WRITABLE_KEY).await else {
        return;
    };
    let mut first_update = true;

    loop {
        match next_event(&mut streams, &ctx.cancel).await {
            Event::Cancelled => {
                client.stop_watching().await;
                info!(section = %section_key, "Watching for configuration changes has stopped");
                return;
            }
            Event::Closed => {
                warn!(section = %section_key, "Configuration provider closed the watch");
                return;
            }
            Event::Error(e) => {
                ctx.metrics.watch_error(&section_key);
                error!(section = %section_key, error = %e, "Error occurred while listening for configuration changes");
            }
            Event::Update(raw) => {
                let start = ctx.metrics.received(&section_key);
                let filtered = filter_writable(client.as_ref(), raw, &section_key).await;

                // The provider pushes once on connect. Applying it could undo an
                // environment override made at start-up.
                if first_update {
                    first_update = false;
                    debug!(section = %section_key, "Ignoring initial push");
                    continue;
                }

                let Some(filtered) = filtered else {
                    continue;
                };
                if apply_writable_update(&ctx, &filtered).is_some() {
                    ctx.metrics.applied(&section_key, start);
                }
            }
        }
    }
}

/// Watch a common writable section. `base_key` is the common section key, e.g.
/// `{stem}/core-common-config-bootstrapper/all-services`.
pub(crate) async fn listen_for_common_changes<C: Configuration>(
    ctx: WatchContext<C>,
    common_client: Arc<dyn ProviderClient>,
    private_client: Arc<dyn ProviderClient>,
    base_key: String,
) {
    let section_key = build_base_key(&[&base_key, WRITABLE_KEY]);
    let Some(mut streams) = subscribe(common_client.as_ref(), WRITABLE_KEY).await else {
        return;
    };
    let mut previous: Option<ConfigTree> = None;

    loop {
        match next_event(&mut streams, &ctx.cancel).await {
            Event::Cancelled => {
                common_client.stop_watching().await;
                info!(section = %section_key, "Watching for configuration changes has stopped");
                return;
            }
            Event::Closed => {
                warn!(section = %section_key, "Configuration provider closed the watch");
                return;
            }
            Event::Error(e) => {
                ctx.metrics.watch_error(&section_key);
                error!(section = %section_key, error = %e, "Error occurred while listening for configuration changes");
            }
            Event::Update(raw) => {
                let start = ctx.metrics.received(&section_key);
                let Some(filtered) = filter_writable(common_client.as_ref(), raw, &section_key).await else {
                    continue;
                };

                // The initial push only seeds the snapshot later pushes are diffed against.
                let Some(before) = previous.replace(filtered.clone()) else {
                    debug!(section = %section_key, "Stored initial common writable snapshot");
                    continue;
                };

                let Some(changed) = diff(&before, &filtered) else {
                    debug!(section = %section_key, "No writable change found in push");
                    continue;
                };

                if is_key_in_private(private_client.as_ref(), &changed).await {
                    ctx.metrics.suppressed(&section_key);
                    info!(key = %changed, "Ignoring changed writable key overridden in private writable");
                    continue;
                }

                let Some(value) = filtered.get_path(&changed) else {
                    info!(key = %changed, "Common writable key was removed; nothing to apply");
                    continue;
                };
                let mut overlay = ConfigTree::new();
                overlay.insert_path(&changed, value.clone());

                if apply_writable_update(&ctx, &overlay).is_some() {
                    ctx.metrics.applied(&section_key, start);
                }
            }
        }
    }
}

/// Whether the private writable section stores `changed` or anything below it.
///
/// Errors count as "stored": an undetermined answer must not clobber an override.
async fn is_key_in_private(private_client: &dyn ProviderClient, changed: &KeyPath) -> bool {
    let keys = match private_client.get_configuration_keys(WRITABLE_KEY).await {
        Ok(keys) => keys,
        Err(e) => {
            error!(error = %e, "Could not get writable keys from private configuration");
            return true;
        }
    };

    let changed = build_base_key(&[WRITABLE_KEY, &changed.to_provider_key()]);
    let nested = format!("/{}/", changed);
    let suffix = format!("/{}", changed);
    let prefix = format!("{}/", changed);

    keys.iter().any(|key| {
        key == &changed || key.ends_with(&suffix) || key.contains(&nested) || key.starts_with(&prefix)
    })
}

/// Watch a service-defined section and hand every change after the initial push to
/// `on_change`.
pub(crate) async fn listen_for_custom_changes<F>(
    client: Arc<dyn ProviderClient>,
    section: String,
    cancel: CancelSignal,
    on_change: F,
) where
    F: Fn(ConfigTree) + Send + Sync + 'static,
{
    let Some(mut streams) = subscribe(client.as_ref(), &section).await else {
        return;
    };
    let mut first_update = true;

    loop {
        match next_event(&mut streams, &cancel).await {
            Event::Cancelled => {
                client.stop_watching().await;
                info!(section = %section, "Watching for custom configuration changes has stopped");
                return;
            }
            Event::Closed => {
                warn!(section = %section, "Configuration provider closed the watch");
                return;
            }
            Event::Error(e) => {
                error!(section = %section, error = %e, "Error occurred while listening for custom configuration changes");
            }
            Event::Update(raw) => {
                if first_update {
                    first_update = false;
                    continue;
                }
                info!(section = %section, "Updated custom configuration has been received from the configuration provider");
                on_change(raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::observability::LoggingClient;
    use crate::provider::MemoryProvider;
    use crate::secrets::InsecureSecrets;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const PRIVATE: &str = "edgex/v3/core-data";

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct LevelWritable {
        log_level: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct LevelConfig {
        writable: LevelWritable,
    }

    impl Configuration for LevelConfig {
        type Writable = LevelWritable;

        fn log_level(&self) -> &str {
            &self.writable.log_level
        }

        fn telemetry_interval(&self) -> &str {
            ""
        }

        fn insecure_secrets(&self) -> Option<&InsecureSecrets> {
            None
        }

        fn writable(&self) -> &LevelWritable {
            &self.writable
        }

        fn writable_mut(&mut self) -> &mut LevelWritable {
            &mut self.writable
        }
    }

    /// Applying `DEBUG` is slow, leaving room for a second update to race it.
    struct SlowDebugLogging {
        applied: Mutex<Vec<String>>,
        started: Mutex<Option<mpsc::Sender<()>>>,
    }

    impl LoggingClient for SlowDebugLogging {
        fn set_log_level(&self, level: &str) -> Result<()> {
            if level == "DEBUG" {
                if let Some(started) = self.started.lock().take() {
                    let _ = started.send(());
                }
                thread::sleep(Duration::from_millis(100));
            }
            self.applied.lock().push(level.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_concurrent_updates_dispatch_in_merge_order() {
        let (started_tx, started_rx) = mpsc::channel();
        let logging = Arc::new(SlowDebugLogging {
            applied: Mutex::new(Vec::new()),
            started: Mutex::new(Some(started_tx)),
        });

        let mut initial = LevelConfig::default();
        initial.writable.log_level = "INFO".to_string();
        let ctx = WatchContext {
            shared: SharedConfig::new(initial),
            dispatcher: WritableDispatcher::new(logging.clone()),
            cancel: CancelSignal::new(),
            metrics: LoopMetrics::default(),
        };

        let all_services = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                apply_writable_update(&ctx, &ConfigTree::new().with("LogLevel", "DEBUG"))
            })
        };

        // The second update arrives while the first is still applying its side effect
        started_rx.recv().unwrap();
        let device_services = apply_writable_update(&ctx, &ConfigTree::new().with("LogLevel", "ERROR"));

        assert_eq!(
            all_services.join().unwrap(),
            Some(DispatchOutcome::LogLevel("DEBUG".to_string()))
        );
        assert_eq!(device_services, Some(DispatchOutcome::LogLevel("ERROR".to_string())));

        assert_eq!(*logging.applied.lock(), vec!["DEBUG".to_string(), "ERROR".to_string()]);
        assert_eq!(ctx.shared.get().log_level(), "ERROR");
    }

    #[tokio::test]
    async fn test_key_in_private_matches_whole_segments() {
        let provider = MemoryProvider::new();
        provider.set_value("edgex/v3/core-data/Writable/LogLevel", "DEBUG");
        provider.set_value(
            "edgex/v3/core-data/Writable/InsecureSecrets/DB/SecretData/password",
            "x",
        );
        let client = provider.client(PRIVATE);

        assert!(is_key_in_private(&client, &KeyPath::parse("LogLevel")).await);
        assert!(is_key_in_private(&client, &KeyPath::parse("InsecureSecrets.DB")).await);
        assert!(is_key_in_private(&client, &KeyPath::parse("InsecureSecrets.DB.SecretData.password")).await);
        assert!(!is_key_in_private(&client, &KeyPath::parse("Log")).await);
        assert!(!is_key_in_private(&client, &KeyPath::parse("Telemetry.Interval")).await);
    }

    #[tokio::test]
    async fn test_key_query_failure_counts_as_override() {
        let provider = MemoryProvider::new();
        provider.set_alive(false);
        let client = provider.client(PRIVATE);
        assert!(is_key_in_private(&client, &KeyPath::parse("LogLevel")).await);
    }

    #[tokio::test]
    async fn test_filter_writable_uses_stored_keys() {
        let provider = MemoryProvider::new();
        provider.set_value("edgex/v3/core-data/Writable/LogLevel", "DEBUG");
        let client = provider.client(PRIVATE);

        let raw = ConfigTree::new().with("LogLevel", "DEBUG").with("Interval", "30s");
        let filtered = filter_writable(&client, raw, "edgex/v3/core-data/Writable")
            .await
            .unwrap();
        assert_eq!(filtered, ConfigTree::new().with("LogLevel", "DEBUG"));
    }
}
