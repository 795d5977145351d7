//! Example keeping writable settings in sync with an in-process provider.
//!
//! This example shows how to:
//! - Seed common configuration the way the bootstrapper does
//! - Resolve a service against a provider and push its private file
//! - Watch private and common writable changes being reconciled
//! - Stop every watch loop through the cancellation signal
//!
//! Run with: cargo run --example memory_provider

use layered_config::prelude::*;
use layered_config::secrets::InsecureSecrets;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct Writable {
    log_level: String,
    max_events: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ServiceConfig {
    writable: Writable,
}

impl Configuration for ServiceConfig {
    type Writable = Writable;

    fn log_level(&self) -> &str {
        &self.writable.log_level
    }

    fn telemetry_interval(&self) -> &str {
        ""
    }

    fn insecure_secrets(&self) -> Option<&InsecureSecrets> {
        None
    }

    fn writable(&self) -> &Writable {
        &self.writable
    }

    fn writable_mut(&mut self) -> &mut Writable {
        &mut self.writable
    }
}

const COMMON: &str = "edgex/v3/core-common-config-bootstrapper";

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Memory Provider Example ===\n");

    let provider = MemoryProvider::new();
    provider.set_value(&format!("{}/all-services/Writable/LogLevel", COMMON), "INFO");
    provider.set_value(&format!("{}/all-services/Writable/MaxEvents", COMMON), 100i64);
    provider.set_value(&format!("{}/IsCommonConfigReady", COMMON), true);
    println!("Seeded common configuration\n");

    let dir = std::env::temp_dir().join("layered-config-memory-provider");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("configuration.yaml"), "Writable:\n  LogLevel: DEBUG\n")?;

    let options = BootstrapOptions {
        config_provider_url: Some("consul.http://localhost:8500".to_string()),
        config_dir: dir.display().to_string(),
        ..Default::default()
    };
    let processor = Processor::builder()
        .with_options(options)
        .with_provider_factory(provider.clone())
        .with_logging(Arc::new(NoopLogging))
        .build()?;

    let defaults = ServiceConfig {
        writable: Writable {
            log_level: "WARN".to_string(),
            max_events: 10,
        },
    };
    let config = processor
        .process("core-data", ServiceType::Other, "edgex/v3", defaults)
        .await?;
    println!("Resolved: {:?}", config.get().writable);
    println!("Provider keys after push:");
    for key in provider.keys() {
        println!("  {}", key);
    }
    println!();

    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notifications);
    let _handle = processor.update_notifier().subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("  -> Subscriber notified of a writable change");
    });

    // Let the watch loops consume their initial pushes
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("Common change to MaxEvents (not held privately, applied):");
    provider.set_value(&format!("{}/all-services/Writable/MaxEvents", COMMON), 500i64);
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("  MaxEvents = {}\n", config.get().writable.max_events);

    println!("Common change to LogLevel (held privately, ignored):");
    provider.set_value(&format!("{}/all-services/Writable/LogLevel", COMMON), "ERROR");
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("  LogLevel = {}\n", config.get().writable.log_level);

    println!("Private change to LogLevel (applied):");
    provider.set_value("edgex/v3/core-data/Writable/LogLevel", "TRACE");
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("  LogLevel = {}\n", config.get().writable.log_level);

    println!("Total notifications: {}", notifications.load(Ordering::SeqCst));

    processor.cancel_signal().cancel();
    processor.wait().await;
    fs::remove_dir_all(&dir)?;

    println!("\n=== Example Complete ===");
    Ok(())
}
