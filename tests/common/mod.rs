//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use layered_config::core::Configuration;
use layered_config::error::{ConfigError, Result};
use layered_config::metrics::MetricsManager;
use layered_config::observability::LoggingClient;
use layered_config::provider::MemoryProvider;
use layered_config::secrets::{InsecureSecrets, InsecureSecretsInfo, SecretProvider};
use layered_config::tree::ConfigTree;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const STEM: &str = "edgex/v3";
pub const SERVICE_KEY: &str = "core-data";
pub const PRIVATE_BASE: &str = "edgex/v3/core-data";
pub const ALL_SERVICES_BASE: &str = "edgex/v3/core-common-config-bootstrapper/all-services";
pub const DEVICE_SERVICES_BASE: &str = "edgex/v3/core-common-config-bootstrapper/device-services";
pub const READY_KEY: &str = "edgex/v3/core-common-config-bootstrapper/IsCommonConfigReady";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct TelemetryInfo {
    pub interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct WritableInfo {
    pub log_level: String,
    #[serde(default)]
    pub persist_data: bool,
    #[serde(default)]
    pub insecure_secrets: Option<InsecureSecrets>,
    pub telemetry: TelemetryInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ServiceInfo {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ServiceConfig {
    pub writable: WritableInfo,
    pub service: ServiceInfo,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut secrets = InsecureSecrets::new();
        secrets.insert(
            "DB".to_string(),
            InsecureSecretsInfo {
                secret_name: "postgres".to_string(),
                secret_data: HashMap::from([
                    ("username".to_string(), "postgres".to_string()),
                    ("password".to_string(), "initial".to_string()),
                ]),
            },
        );

        Self {
            writable: WritableInfo {
                log_level: "INFO".to_string(),
                persist_data: true,
                insecure_secrets: Some(secrets),
                telemetry: TelemetryInfo {
                    interval: "30s".to_string(),
                },
            },
            service: ServiceInfo {
                host: "edgex-core-data".to_string(),
                port: 59880,
            },
        }
    }
}

impl Configuration for ServiceConfig {
    type Writable = WritableInfo;

    fn log_level(&self) -> &str {
        &self.writable.log_level
    }

    fn telemetry_interval(&self) -> &str {
        &self.writable.telemetry.interval
    }

    fn insecure_secrets(&self) -> Option<&InsecureSecrets> {
        self.writable.insecure_secrets.as_ref()
    }

    fn writable(&self) -> &WritableInfo {
        &self.writable
    }

    fn writable_mut(&mut self) -> &mut WritableInfo {
        &mut self.writable
    }

    fn apply_dev_mode_host(&mut self, host: &str) {
        self.service.host = host.to_string();
    }
}

/// Stands in for the logging, secret and metrics subsystems.
#[derive(Default)]
pub struct Recorder {
    pub levels: Mutex<Vec<String>>,
    pub secrets: Mutex<Vec<String>>,
    pub intervals: Mutex<Vec<Duration>>,
    pub token_requests: Mutex<Vec<(String, String)>>,
}

impl LoggingClient for Recorder {
    fn set_log_level(&self, level: &str) -> Result<()> {
        layered_config::observability::parse_level(level)?;
        self.levels.lock().push(level.to_string());
        Ok(())
    }
}

impl SecretProvider for Recorder {
    fn secret_updated_at_secret_name(&self, secret_name: &str) {
        self.secrets.lock().push(secret_name.to_string());
    }

    fn get_access_token(&self, token_type: &str, service_key: &str) -> Result<String> {
        self.token_requests
            .lock()
            .push((token_type.to_string(), service_key.to_string()));
        if token_type.is_empty() {
            return Err(ConfigError::Provider("no provider type".to_string()));
        }
        Ok("token".to_string())
    }
}

impl MetricsManager for Recorder {
    fn reset_interval(&self, interval: Duration) {
        self.intervals.lock().push(interval);
    }
}

/// The common configuration as the bootstrapper seeds it.
pub fn all_services_tree() -> ConfigTree {
    ConfigTree::new()
        .with(
            "Writable",
            ConfigTree::new()
                .with("LogLevel", "INFO")
                .with("PersistData", true)
                .with("Telemetry", ConfigTree::new().with("Interval", "30s"))
                .with(
                    "InsecureSecrets",
                    ConfigTree::new().with(
                        "DB",
                        ConfigTree::new()
                            .with("SecretName", "postgres")
                            .with(
                                "SecretData",
                                ConfigTree::new()
                                    .with("username", "postgres")
                                    .with("password", "initial"),
                            ),
                    ),
                ),
        )
        .with(
            "Service",
            ConfigTree::new()
                .with("Host", "edgex-core-data")
                .with("Port", 59880i64),
        )
}

/// A provider holding the all-services section with the readiness marker set.
pub fn seeded_provider() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.set_tree(ALL_SERVICES_BASE, &all_services_tree());
    provider.set_value(READY_KEY, true);
    provider
}

pub fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
