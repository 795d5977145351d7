//! Example resolving a service configuration from files only.
//!
//! This example shows how to:
//! - Declare a service configuration type
//! - Layer a common configuration file under the private file
//! - Apply environment overrides to the private file
//!
//! Run with: cargo run --example file_only

use layered_config::prelude::*;
use layered_config::secrets::InsecureSecrets;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct Writable {
    log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct Service {
    host: String,
    port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ServiceConfig {
    writable: Writable,
    service: Service,
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

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== File-Only Resolution Example ===\n");

    let dir = std::env::temp_dir().join("layered-config-file-only");
    fs::create_dir_all(&dir)?;

    fs::write(
        dir.join("common.yaml"),
        r#"
all-services:
  Writable:
    LogLevel: INFO
  Service:
    Host: edgex-core-data
    Port: 59880
"#,
    )?;
    fs::write(
        dir.join("configuration.yaml"),
        r#"
Writable:
  LogLevel: DEBUG
Service:
  Port: 59881
"#,
    )?;
    println!("Wrote common.yaml and configuration.yaml to {}\n", dir.display());

    let options = BootstrapOptions {
        config_dir: dir.display().to_string(),
        common_config: Some(dir.join("common.yaml").display().to_string()),
        ..Default::default()
    };

    // EDGEX_SERVICE_PORT wins over the private file
    let overrides = EnvOverrides::new()
        .with_prefix("EDGEX")
        .with_vars([("EDGEX_SERVICE_PORT", "60000")]);

    let processor = Processor::builder()
        .with_options(options)
        .with_overrides(overrides)
        .with_logging(Arc::new(NoopLogging))
        .build()?;

    let defaults = ServiceConfig {
        writable: Writable {
            log_level: "WARN".to_string(),
        },
        service: Service {
            host: "localhost".to_string(),
            port: 8080,
        },
    };

    let config = processor
        .process("core-data", ServiceType::Other, "edgex/v3", defaults)
        .await?;

    let resolved = config.get();
    println!("Resolved configuration:");
    println!("  LogLevel: {} (private file)", resolved.writable.log_level);
    println!("  Host:     {} (common file)", resolved.service.host);
    println!("  Port:     {} (environment override)", resolved.service.port);

    fs::remove_dir_all(&dir)?;
    println!("\n=== Example Complete ===");
    Ok(())
}
