//! Provider client capability.

use crate::error::{ConfigError, Result};
use crate::provider::ProviderInfo;
use crate::secrets::SecretProvider;
use crate::tree::{ConfigTree, build_base_key};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The two independent event streams of a watch subscription.
///
/// `updates` carries a snapshot of the watched section per push; `errors` carries
/// transport failures. Both close when the watch is stopped.
#[derive(Debug)]
pub struct WatchStreams {
    /// Snapshots of the watched section, relative to the section key
    pub updates: mpsc::UnboundedReceiver<ConfigTree>,
    /// Transport errors reported while watching
    pub errors: mpsc::UnboundedReceiver<ConfigError>,
}

/// A client bound to one base path of a key/value configuration provider.
///
/// All relative keys are resolved under the base path with `/` as separator.
/// Keys returned by [`get_configuration_keys`](Self::get_configuration_keys) are
/// fully qualified.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Whether the provider is reachable.
    async fn is_alive(&self) -> bool;

    /// Everything stored under the base path, as a tree relative to it.
    async fn get_configuration(&self) -> Result<ConfigTree>;

    /// The raw value stored at a fully qualified key.
    async fn get_configuration_value_by_full_path(&self, full_path: &str) -> Result<Vec<u8>>;

    /// Fully qualified keys stored under `base_path/prefix`. An empty prefix lists the
    /// whole base path.
    async fn get_configuration_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Store every leaf of `tree` under the base path.
    ///
    /// Existing keys are only replaced when `overwrite` is set.
    async fn put_configuration_map(&self, tree: &ConfigTree, overwrite: bool) -> Result<()>;

    /// Whether anything is stored under the base path.
    async fn has_configuration(&self) -> Result<bool>;

    /// Whether anything is stored under `base_path/name`.
    async fn has_sub_configuration(&self, name: &str) -> Result<bool>;

    /// Subscribe to changes of `base_path/section`.
    ///
    /// Providers deliver one push with the current contents as soon as the
    /// subscription is established.
    async fn watch_for_changes(&self, section: &str) -> Result<WatchStreams>;

    /// End every watch this client started.
    async fn stop_watching(&self);
}

/// Settings handed to a [`ProviderFactory`] for one client.
#[derive(Debug, Clone)]
pub struct ProviderClientConfig {
    /// Where the provider lives
    pub info: ProviderInfo,
    /// Base path the client is bound to, e.g. `edgex/v3/core-data`
    pub base_path: String,
    /// Access token for providers that require authentication
    pub access_token: Option<String>,
}

/// Creates provider clients.
pub trait ProviderFactory: Send + Sync {
    /// Create a client bound to `config.base_path`.
    fn create_client(&self, config: ProviderClientConfig) -> Result<Arc<dyn ProviderClient>>;
}

/// Where to fetch the provider access token from.
#[derive(Clone, Copy)]
pub struct AccessTokenSource<'a> {
    /// Secret subsystem holding the token
    pub secrets: &'a dyn SecretProvider,
    /// Service the token is issued for
    pub service_key: &'a str,
}

/// Create a provider client for `client_key` under `config_stem`.
///
/// The base path is `{config_stem}/{client_key}` with exactly one separator between
/// them. When a token source is given, an access token for the provider type is
/// fetched first.
///
/// # Errors
///
/// Returns an error if the access token cannot be obtained or the factory fails.
pub fn create_provider_client(
    factory: &dyn ProviderFactory,
    info: &ProviderInfo,
    config_stem: &str,
    client_key: &str,
    token_source: Option<AccessTokenSource<'_>>,
) -> Result<Arc<dyn ProviderClient>> {
    let base_path = build_base_key(&[config_stem, client_key]);

    let access_token = match token_source {
        Some(source) => {
            let token = source
                .secrets
                .get_access_token(info.provider_type(), source.service_key)
                .map_err(|e| {
                    ConfigError::Provider(format!(
                        "failed to get configuration provider ({}) access token: {}",
                        info.provider_type(),
                        e
                    ))
                })?;
            debug!(length = token.len(), "Using configuration provider access token");
            Some(token)
        }
        None => {
            debug!("Not configured to use a configuration provider access token");
            None
        }
    };

    info!(
        provider = info.provider_type(),
        url = %info.url(),
        base_path = %base_path,
        "Using configuration provider"
    );

    factory.create_client(ProviderClientConfig {
        info: info.clone(),
        base_path,
        access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use parking_lot::Mutex;

    struct TokenSecrets {
        requests: Mutex<Vec<(String, String)>>,
    }

    impl SecretProvider for TokenSecrets {
        fn secret_updated_at_secret_name(&self, _secret_name: &str) {}

        fn get_access_token(&self, token_type: &str, service_key: &str) -> Result<String> {
            self.requests
                .lock()
                .push((token_type.to_string(), service_key.to_string()));
            Ok("s3cr3t".to_string())
        }
    }

    struct FailingSecrets;

    impl SecretProvider for FailingSecrets {
        fn secret_updated_at_secret_name(&self, _secret_name: &str) {}

        fn get_access_token(&self, _token_type: &str, _service_key: &str) -> Result<String> {
            Err(ConfigError::Provider("vault sealed".to_string()))
        }
    }

    struct RecordingFactory {
        configs: Mutex<Vec<ProviderClientConfig>>,
        inner: MemoryProvider,
    }

    impl ProviderFactory for RecordingFactory {
        fn create_client(&self, config: ProviderClientConfig) -> Result<Arc<dyn ProviderClient>> {
            self.configs.lock().push(config.clone());
            self.inner.create_client(config)
        }
    }

    fn info() -> ProviderInfo {
        ProviderInfo::from_url("consul.http://localhost:8500").unwrap()
    }

    #[test]
    fn test_base_path_has_single_separator() {
        let factory = RecordingFactory {
            configs: Mutex::new(Vec::new()),
            inner: MemoryProvider::new(),
        };

        create_provider_client(&factory, &info(), "edgex/v3/", "core-data", None).unwrap();
        create_provider_client(&factory, &info(), "edgex/v3", "core-data", None).unwrap();

        let configs = factory.configs.lock();
        assert_eq!(configs[0].base_path, "edgex/v3/core-data");
        assert_eq!(configs[1].base_path, "edgex/v3/core-data");
        assert!(configs[0].access_token.is_none());
    }

    #[test]
    fn test_access_token_requested_for_service() {
        let factory = RecordingFactory {
            configs: Mutex::new(Vec::new()),
            inner: MemoryProvider::new(),
        };
        let secrets = TokenSecrets {
            requests: Mutex::new(Vec::new()),
        };

        create_provider_client(
            &factory,
            &info(),
            "edgex/v3",
            "core-common-config-bootstrapper/all-services",
            Some(AccessTokenSource {
                secrets: &secrets,
                service_key: "core-data",
            }),
        )
        .unwrap();

        assert_eq!(
            secrets.requests.lock().as_slice(),
            &[("consul".to_string(), "core-data".to_string())]
        );
        assert_eq!(factory.configs.lock()[0].access_token.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_access_token_failure() {
        let factory = MemoryProvider::new();
        let result = create_provider_client(
            &factory,
            &info(),
            "edgex/v3",
            "core-data",
            Some(AccessTokenSource {
                secrets: &FailingSecrets,
                service_key: "core-data",
            }),
        );
        assert!(matches!(result, Err(ConfigError::Provider(_))));
    }
}
