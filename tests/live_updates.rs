//! Reconciliation of writable settings after start-up.

mod common;

use common::*;
use layered_config::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

struct Service {
    provider: MemoryProvider,
    processor: Processor,
    config: SharedConfig<ServiceConfig>,
    recorder: Arc<Recorder>,
    _dir: TempDir,
}

impl Service {
    async fn shutdown(self) {
        self.processor.cancel_signal().cancel();
        tokio::time::timeout(Duration::from_secs(2), self.processor.wait())
            .await
            .unwrap();
    }
}

/// Start a service whose private file sets only `Writable.LogLevel`, and wait for
/// every writable watch to be registered.
async fn start(provider: MemoryProvider, service_type: ServiceType, watches: usize) -> Service {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "configuration.json",
        r#"{"Writable": {"LogLevel": "DEBUG"}}"#,
    );

    let options = BootstrapOptions {
        config_provider_url: Some("consul.http://localhost:8500".to_string()),
        config_dir: dir.path().display().to_string(),
        config_file_name: "configuration.json".to_string(),
        ..Default::default()
    };

    let recorder = Arc::new(Recorder::default());
    let processor = Processor::builder()
        .with_options(options)
        .with_provider_factory(provider.clone())
        .with_overrides(EnvOverrides::new().with_vars(Vec::<(String, String)>::new()))
        .with_logging(recorder.clone())
        .with_secret_provider(recorder.clone())
        .with_metrics_manager(recorder.clone())
        .build()
        .unwrap();

    let config = processor
        .process(SERVICE_KEY, service_type, STEM, ServiceConfig::default())
        .await
        .unwrap();

    let watching = provider.clone();
    assert!(eventually(|| watching.watcher_count() == watches).await);

    Service {
        provider,
        processor,
        config,
        recorder,
        _dir: dir,
    }
}

fn counting(notifier: &UpdateNotifier) -> (Arc<AtomicUsize>, layered_config::notify::SubscriptionHandle) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let handle = notifier.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (hits, handle)
}

#[tokio::test]
async fn test_initial_push_is_ignored() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;
    let (hits, _handle) = counting(service.processor.update_notifier());

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(*service.recorder.levels.lock(), vec!["DEBUG".to_string()]);
    assert!(service.recorder.intervals.lock().is_empty());
    assert_eq!(service.config.get().writable.log_level, "DEBUG");

    service.shutdown().await;
}

#[tokio::test]
async fn test_private_log_level_change() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    service
        .provider
        .set_value("edgex/v3/core-data/Writable/LogLevel", "ERROR");

    let config = service.config.clone();
    assert!(eventually(|| config.get().writable.log_level == "ERROR").await);
    assert_eq!(
        service.recorder.levels.lock().last().map(String::as_str),
        Some("ERROR")
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_common_telemetry_change_applies() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/all-services/Writable/Telemetry/Interval",
        "0s",
    );

    let recorder = Arc::clone(&service.recorder);
    assert!(eventually(|| !recorder.intervals.lock().is_empty()).await);
    // Zero disables reporting
    assert_eq!(*service.recorder.intervals.lock(), vec![Duration::MAX]);
    assert_eq!(service.config.get().writable.telemetry.interval, "0s");
    // Only the log level from start-up was ever set
    assert_eq!(service.recorder.levels.lock().len(), 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_common_change_shadowed_by_private() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/all-services/Writable/LogLevel",
        "ERROR",
    );
    // A later change on the same watch proves the first one was processed
    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/all-services/Writable/Telemetry/Interval",
        "15s",
    );

    let recorder = Arc::clone(&service.recorder);
    assert!(eventually(|| !recorder.intervals.lock().is_empty()).await);
    assert_eq!(*service.recorder.intervals.lock(), vec![Duration::from_secs(15)]);
    assert_eq!(service.config.get().writable.log_level, "DEBUG");
    assert_eq!(*service.recorder.levels.lock(), vec!["DEBUG".to_string()]);

    service.shutdown().await;
}

#[tokio::test]
async fn test_unhandled_change_notifies_subscribers() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;
    let (hits, _handle) = counting(service.processor.update_notifier());

    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/all-services/Writable/PersistData",
        false,
    );

    let counter = Arc::clone(&hits);
    assert!(eventually(|| counter.load(Ordering::SeqCst) == 1).await);
    assert!(!service.config.get().writable.persist_data);

    service.shutdown().await;
}

#[tokio::test]
async fn test_removed_common_key_changes_nothing() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;
    let (hits, _handle) = counting(service.processor.update_notifier());

    service
        .provider
        .remove_value("edgex/v3/core-common-config-bootstrapper/all-services/Writable/PersistData");
    // A later change on the same watch proves the removal was processed
    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/all-services/Writable/Telemetry/Interval",
        "20s",
    );

    let recorder = Arc::clone(&service.recorder);
    assert!(eventually(|| !recorder.intervals.lock().is_empty()).await);
    assert_eq!(*service.recorder.intervals.lock(), vec![Duration::from_secs(20)]);

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(service.recorder.secrets.lock().is_empty());
    assert_eq!(*service.recorder.levels.lock(), vec!["DEBUG".to_string()]);
    assert!(service.config.get().writable.persist_data);

    service.shutdown().await;
}

#[tokio::test]
async fn test_secret_rotation_reported() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    service.provider.set_value(
        "edgex/v3/core-data/Writable/InsecureSecrets/DB/SecretData/password",
        "rotated",
    );

    let recorder = Arc::clone(&service.recorder);
    assert!(eventually(|| !recorder.secrets.lock().is_empty()).await);
    assert_eq!(*service.recorder.secrets.lock(), vec!["postgres".to_string()]);

    let config = service.config.get();
    let db = &config.writable.insecure_secrets.as_ref().unwrap()["DB"];
    assert_eq!(db.secret_data["password"], "rotated");
    assert_eq!(db.secret_data["username"], "postgres");

    service.shutdown().await;
}

#[tokio::test]
async fn test_watch_error_does_not_stop_loop() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    service
        .provider
        .inject_watch_error(PRIVATE_BASE, "connection reset");
    service
        .provider
        .set_value("edgex/v3/core-data/Writable/LogLevel", "WARN");

    let config = service.config.clone();
    assert!(eventually(|| config.get().writable.log_level == "WARN").await);

    service.shutdown().await;
}

#[tokio::test]
async fn test_service_type_section_watched() {
    let provider = seeded_provider();
    provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/device-services/Writable/Telemetry/Interval",
        "10s",
    );
    let service = start(provider, ServiceType::Device, 3).await;
    assert_eq!(service.config.get().writable.telemetry.interval, "10s");

    service.provider.set_value(
        "edgex/v3/core-common-config-bootstrapper/device-services/Writable/Telemetry/Interval",
        "5s",
    );

    let recorder = Arc::clone(&service.recorder);
    assert!(eventually(|| !recorder.intervals.lock().is_empty()).await);
    assert_eq!(*service.recorder.intervals.lock(), vec![Duration::from_secs(5)]);
    assert_eq!(service.config.get().writable.telemetry.interval, "5s");

    service.shutdown().await;
}

#[tokio::test]
async fn test_custom_section_changes_delivered() {
    let service = start(seeded_provider(), ServiceType::Other, 2).await;

    let received: Arc<Mutex<Vec<ConfigTree>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    service
        .processor
        .listen_for_custom_config_changes("AppCustom", move |tree| sink.lock().push(tree));

    let watching = service.provider.clone();
    assert!(eventually(|| watching.watcher_count() == 3).await);

    service
        .provider
        .set_value("edgex/v3/core-data/AppCustom/ResourceNames", "Int8");

    let updates = Arc::clone(&received);
    assert!(eventually(|| updates.lock().len() == 1).await);
    assert_eq!(
        received.lock()[0],
        ConfigTree::new().with("ResourceNames", "Int8")
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_cancel_stops_every_watch() {
    let service = start(seeded_provider(), ServiceType::App, 3).await;
    let provider = service.provider.clone();

    service.shutdown().await;

    assert_eq!(provider.watcher_count(), 0);
}
