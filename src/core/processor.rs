//! Layered configuration resolution.

use crate::core::watch::{
    LoopMetrics, WatchContext, listen_for_common_changes, listen_for_custom_changes,
    listen_for_private_changes,
};
use crate::core::{
    ALL_SERVICES_KEY, BootstrapOptions, COMMON_CONFIG_DONE, CORE_COMMON_CONFIG_SERVICE_KEY,
    Configuration, ProcessorBuilder, ServiceType, SharedConfig, StartupTimer, WritableDispatcher,
};
use crate::error::{ConfigError, Result};
use crate::notify::{CancelSignal, UpdateNotifier};
use crate::observability::LoggingClient;
use crate::provider::{
    AccessTokenSource, ProviderClient, ProviderFactory, ProviderInfo, create_provider_client,
};
use crate::secrets::SecretProvider;
use crate::sources::{FileSource, Overrides, override_configuration};
use crate::tree::{
    ConfigTree, KeySet, build_base_key, merge_trees, merge_values, remove_unused_settings,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Host used for every service when running in development mode.
const DEV_MODE_HOST: &str = "localhost";

/// Clients for the common sections, kept for the watch loops.
struct CommonClients {
    all_services: Arc<dyn ProviderClient>,
    service_type: Option<(String, Arc<dyn ProviderClient>)>,
}

/// Resolves a service's configuration and keeps its writable section live.
///
/// Resolution layers, lowest precedence first: common configuration shared by all
/// services, common configuration for the service type, the service's private
/// configuration. With a provider configured the common layers come from the
/// provider; the private layer comes from the provider when it already holds it and
/// otherwise from the private file, which is then pushed to the provider. Without a
/// provider everything comes from files.
///
/// # Examples
///
/// ```rust,no_run
/// use layered_config::prelude::*;
/// # use layered_config::secrets::InsecureSecrets;
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// # struct Writable { log_level: String }
/// # #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// # struct ServiceConfig { writable: Writable }
/// # impl Configuration for ServiceConfig {
/// #     type Writable = Writable;
/// #     fn log_level(&self) -> &str { &self.writable.log_level }
/// #     fn telemetry_interval(&self) -> &str { "" }
/// #     fn insecure_secrets(&self) -> Option<&InsecureSecrets> { None }
/// #     fn writable(&self) -> &Writable { &self.writable }
/// #     fn writable_mut(&mut self) -> &mut Writable { &mut self.writable }
/// # }
///
/// # async fn example() -> Result<()> {
/// let processor = Processor::builder()
///     .with_options(BootstrapOptions::from_env("EDGEX")?)
///     .with_provider_factory(MemoryProvider::new())
///     .build()?;
///
/// let config = processor
///     .process("core-data", ServiceType::Other, "edgex/v3", ServiceConfig::default())
///     .await?;
/// println!("log level: {}", config.get().log_level());
///
/// processor.cancel_signal().cancel();
/// processor.wait().await;
/// # Ok(())
/// # }
/// ```
pub struct Processor {
    options: BootstrapOptions,
    provider_info: ProviderInfo,
    factory: Option<Arc<dyn ProviderFactory>>,
    overrides: Arc<dyn Overrides>,
    logging: Arc<dyn LoggingClient>,
    secret_provider: Option<Arc<dyn SecretProvider>>,
    dispatcher: WritableDispatcher,
    cancel: CancelSignal,
    metrics: LoopMetrics,
    private_client: Mutex<Option<Arc<dyn ProviderClient>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Processor {
    /// Create a new builder.
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        options: BootstrapOptions,
        provider_info: ProviderInfo,
        factory: Option<Arc<dyn ProviderFactory>>,
        overrides: Arc<dyn Overrides>,
        logging: Arc<dyn LoggingClient>,
        secret_provider: Option<Arc<dyn SecretProvider>>,
        dispatcher: WritableDispatcher,
        cancel: CancelSignal,
        metrics: LoopMetrics,
    ) -> Self {
        Self {
            options,
            provider_info,
            factory,
            overrides,
            logging,
            secret_provider,
            dispatcher,
            cancel,
            metrics,
            private_client: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The options resolution runs with.
    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    /// The configured provider, if any.
    pub fn provider_info(&self) -> &ProviderInfo {
        &self.provider_info
    }

    /// The signal that stops every watch loop and start-up wait.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Raised when a writable change is applied that no built-in side effect handles.
    pub fn update_notifier(&self) -> &UpdateNotifier {
        self.dispatcher.notifier()
    }

    /// Client for the service's private section, once [`process`](Self::process) has
    /// run with a provider.
    pub fn private_client(&self) -> Option<Arc<dyn ProviderClient>> {
        self.private_client.lock().clone()
    }

    /// Resolve the configuration of `service_key`, starting from `service_config`
    /// (usually the compiled-in defaults), and start the writable watch loops.
    ///
    /// Must run inside a tokio runtime. The returned handle is shared with the watch
    /// loops, which keep updating it until the cancellation signal fires.
    ///
    /// # Errors
    ///
    /// Any failure aborts resolution; nothing is watched in that case.
    pub async fn process<C: Configuration>(
        &self,
        service_key: &str,
        service_type: ServiceType,
        config_stem: &str,
        service_config: C,
    ) -> Result<SharedConfig<C>> {
        let overwrite = self.options.overwrite_config;
        let use_provider = self.provider_info.use_provider();
        let mut config = service_config;

        let mut provider_has_config = false;
        let mut clients: Option<(CommonClients, Arc<dyn ProviderClient>)> = None;

        if use_provider {
            let factory = self.factory.as_deref().ok_or_else(|| {
                ConfigError::Provider(format!(
                    "{} is configured but no provider factory was supplied",
                    self.provider_info
                ))
            })?;

            let common = self
                .load_common_config(factory, service_key, &service_type, config_stem, &mut config)
                .await?;
            info!("Common configuration loaded from the configuration provider. No overrides applied");

            let private_client = self.create_client(factory, config_stem, service_key, service_key)?;
            provider_has_config = private_client.has_configuration().await.map_err(|e| {
                ConfigError::Provider(format!(
                    "failed to check whether the configuration provider has private configuration: {}",
                    e
                ))
            })?;

            if provider_has_config && !overwrite {
                self.load_private_config_from_provider(
                    private_client.as_ref(),
                    &build_base_key(&[config_stem, service_key]),
                    &mut config,
                )
                .await?;
                info!("Private configuration loaded from the configuration provider. No overrides applied");
            }

            clients = Some((common, private_client));
        } else if let Some(location) = self.options.common_config.as_deref().filter(|l| !l.is_empty()) {
            load_common_config_from_file(Path::new(location), &service_type, &mut config)?;
            let override_count = override_configuration(self.overrides.as_ref(), &mut config)?;
            info!(overrides = override_count, "Common configuration loaded from file");
        }

        if !use_provider || !provider_has_config || overwrite {
            let private_tree = self.load_private_config_from_file(&mut config)?;

            if let Some((_, private_client)) = &clients {
                private_client
                    .put_configuration_map(&private_tree, overwrite)
                    .await
                    .map_err(|e| {
                        ConfigError::Provider(format!(
                            "could not push private configuration into the configuration provider: {}",
                            e
                        ))
                    })?;
                info!("Private configuration has been pushed into the configuration provider with overrides applied");
            }
        }

        if self.options.dev_mode {
            config.apply_dev_mode_host(DEV_MODE_HOST);
        }

        self.logging.set_log_level(config.log_level())?;

        let shared = SharedConfig::new(config);

        if let Some((common, private_client)) = clients {
            self.start_writable_watches(&shared, config_stem, service_key, common, &private_client);
            *self.private_client.lock() = Some(private_client);
        }

        Ok(shared)
    }

    /// Load a service-defined section into `custom`.
    ///
    /// With a provider holding the section (and no overwrite requested) the section is
    /// read from the provider. Otherwise it is read from the private file, environment
    /// overrides are applied, and the result is pushed to the provider if one is in use.
    /// Only top-level keys that `custom` declares are taken from either source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or does not fit `custom`.
    pub async fn load_custom_config_section<T>(&self, custom: &mut T, section: &str) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(client) = self.private_client() else {
            info!("Skipping use of configuration provider for custom configuration: provider not available");
            let file_tree = self.load_file(&self.options.config_file_location())?;
            return merge_declared(custom, file_tree);
        };

        info!(section = section, "Checking if custom configuration exists in the configuration provider");
        let exists = client.has_sub_configuration(section).await.map_err(|e| {
            ConfigError::Provider(format!(
                "unable to determine if custom configuration exists in the configuration provider: {}",
                e
            ))
        })?;

        if exists && !self.options.overwrite_config {
            let raw = client.get_configuration().await?;
            merge_declared(custom, raw)?;
            info!(section = section, "Loaded custom configuration from the configuration provider, no overrides applied");
            return Ok(());
        }

        let file_tree = self.load_file(&self.options.config_file_location())?;
        merge_declared(custom, file_tree)?;
        let override_count = override_configuration(self.overrides.as_ref(), custom)?;
        info!(section = section, overrides = override_count, "Loaded custom configuration from file");

        let to_push = ConfigTree::from_serializable(custom)?;
        client.put_configuration_map(&to_push, true).await.map_err(|e| {
            ConfigError::Provider(format!("error pushing custom configuration to the configuration provider: {}", e))
        })?;
        info!(
            section = section,
            overwritten = exists,
            "Custom configuration loaded from file and pushed to the configuration provider"
        );
        Ok(())
    }

    /// Watch a service-defined section and call `on_change` with its contents after
    /// every change. The provider's initial push is discarded.
    ///
    /// Does nothing when no provider is in use.
    pub fn listen_for_custom_config_changes<F>(&self, section: &str, on_change: F)
    where
        F: Fn(ConfigTree) + Send + Sync + 'static,
    {
        let Some(client) = self.private_client() else {
            warn!(section = section, "Unable to watch custom configuration for changes: configuration provider not enabled");
            return;
        };

        self.spawn(listen_for_custom_changes(client, section.to_string(), self.cancel.clone(), on_change));
        info!(section = section, "Watching for custom configuration changes has started");
    }

    /// Wait for every watch loop to finish. Loops only finish once the cancellation
    /// signal fires or their provider closes the watch.
    pub async fn wait(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Watch loop terminated abnormally");
            }
        }
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().push(tokio::spawn(future));
    }

    fn create_client(
        &self,
        factory: &dyn ProviderFactory,
        config_stem: &str,
        client_key: &str,
        service_key: &str,
    ) -> Result<Arc<dyn ProviderClient>> {
        let token_source = self.secret_provider.as_deref().map(|secrets| AccessTokenSource {
            secrets,
            service_key,
        });
        create_provider_client(factory, &self.provider_info, config_stem, client_key, token_source)
    }

    /// Load `all-services`, wait for it to be ready, then layer the service type's
    /// section on top.
    async fn load_common_config<C: Configuration>(
        &self,
        factory: &dyn ProviderFactory,
        service_key: &str,
        service_type: &ServiceType,
        config_stem: &str,
        config: &mut C,
    ) -> Result<CommonClients> {
        let all_services_key = build_base_key(&[CORE_COMMON_CONFIG_SERVICE_KEY, ALL_SERVICES_KEY]);
        let all_services = self
            .create_client(factory, config_stem, &all_services_key, service_key)
            .map_err(|e| ConfigError::Provider(format!("failed to create provider for {}: {}", ALL_SERVICES_KEY, e)))?;

        let ready_path = build_base_key(&[config_stem, CORE_COMMON_CONFIG_SERVICE_KEY, COMMON_CONFIG_DONE]);
        self.wait_for_common_config(all_services.as_ref(), &ready_path).await?;

        load_from_provider(all_services.as_ref(), config).await?;

        let Some(type_section) = service_type.section_key() else {
            return Ok(CommonClients {
                all_services,
                service_type: None,
            });
        };

        info!(service_type = %service_type, "Loading the common configuration for service type");
        let section_key = build_base_key(&[CORE_COMMON_CONFIG_SERVICE_KEY, type_section]);
        let type_client = self
            .create_client(factory, config_stem, &section_key, service_key)
            .map_err(|e| ConfigError::Provider(format!("failed to create provider for {}: {}", type_section, e)))?;

        // Seeded from the resolved config so the unfiltered copy still carries defaults.
        let mut type_config = config.clone();
        load_from_provider(type_client.as_ref(), &mut type_config).await?;
        let type_keys: KeySet = type_client.get_configuration_keys("").await?.into_iter().collect();

        let type_tree = remove_unused_settings(&type_config, &build_base_key(&[config_stem, &section_key]), &type_keys)?;
        merge_values(config, &type_tree)?;

        Ok(CommonClients {
            all_services,
            service_type: Some((build_base_key(&[config_stem, &section_key]), type_client)),
        })
    }

    /// Block until the provider is alive and the common configuration marker is true.
    async fn wait_for_common_config(&self, client: &dyn ProviderClient, ready_path: &str) -> Result<()> {
        let timer = self.options.startup_timer();

        let mut alive = false;
        while timer.has_not_elapsed() {
            if client.is_alive().await {
                alive = true;
                break;
            }
            warn!("Waiting for configuration provider to be available");
            self.pause(&timer, "aborted waiting for the configuration provider to be available")
                .await?;
        }
        if !alive {
            return Err(ConfigError::ProviderUnavailable(
                "configuration provider is not available".to_string(),
            ));
        }

        while timer.has_not_elapsed() {
            match client.get_configuration_value_by_full_path(ready_path).await {
                Ok(raw) => {
                    let value = String::from_utf8_lossy(&raw);
                    match parse_bool(value.trim()) {
                        Some(true) => return Ok(()),
                        Some(false) => {}
                        None => warn!(path = ready_path, value = %value, "Did not get a boolean from the configuration provider"),
                    }
                }
                Err(e) => debug!(path = ready_path, error = %e, "Common configuration readiness marker not available"),
            }
            warn!("Waiting for common configuration to be available from the configuration provider");
            self.pause(&timer, "aborted waiting for common configuration to be available")
                .await?;
        }

        Err(ConfigError::CommonConfigTimeout(format!(
            "common configuration is not loaded - check to make sure {} ran",
            CORE_COMMON_CONFIG_SERVICE_KEY
        )))
    }

    async fn pause(&self, timer: &StartupTimer, cancelled: &str) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ConfigError::Cancelled(cancelled.to_string())),
            _ = timer.sleep_for_interval() => Ok(()),
        }
    }

    async fn load_private_config_from_provider<C: Configuration>(
        &self,
        client: &dyn ProviderClient,
        base_key: &str,
        config: &mut C,
    ) -> Result<()> {
        // Populate a copy so defaults the provider does not hold can be filtered out.
        let mut private_config = config.clone();
        load_from_provider(client, &mut private_config).await?;

        let private_keys: KeySet = client.get_configuration_keys("").await?.into_iter().collect();
        let private_tree = remove_unused_settings(&private_config, base_key, &private_keys).map_err(|e| {
            ConfigError::Conversion(format!("could not remove unused settings from private configuration: {}", e))
        })?;

        merge_values(config, &private_tree)
    }

    /// Load the private file, apply environment overrides, and merge it into `config`.
    /// Returns the tree that was merged.
    fn load_private_config_from_file<C: Configuration>(&self, config: &mut C) -> Result<ConfigTree> {
        let mut tree = self.load_file(&self.options.config_file_location())?;
        let override_count = self.overrides.override_tree(&mut tree)?;
        info!(overrides = override_count, "Private configuration loaded from file");
        merge_values(config, &tree)?;
        Ok(tree)
    }

    fn load_file(&self, path: &Path) -> Result<ConfigTree> {
        FileSource::new(path).load()
    }

    fn start_writable_watches<C: Configuration>(
        &self,
        shared: &SharedConfig<C>,
        config_stem: &str,
        service_key: &str,
        common: CommonClients,
        private_client: &Arc<dyn ProviderClient>,
    ) {
        let ctx = WatchContext {
            shared: shared.clone(),
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
            metrics: self.metrics.clone(),
        };

        self.spawn(listen_for_private_changes(
            ctx.clone(),
            Arc::clone(private_client),
            build_base_key(&[config_stem, service_key]),
        ));
        info!("Listening for private configuration changes");

        self.spawn(listen_for_common_changes(
            ctx.clone(),
            common.all_services,
            Arc::clone(private_client),
            build_base_key(&[config_stem, CORE_COMMON_CONFIG_SERVICE_KEY, ALL_SERVICES_KEY]),
        ));
        info!("Listening for all services common configuration changes");

        if let Some((section_key, type_client)) = common.service_type {
            info!(section = %section_key, "Listening for service type common configuration changes");
            self.spawn(listen_for_common_changes(ctx, type_client, Arc::clone(private_client), section_key));
        }
    }
}

/// Read everything under the client's base path into `config`.
async fn load_from_provider<C: Configuration>(client: &dyn ProviderClient, config: &mut C) -> Result<()> {
    let raw = client.get_configuration().await?;
    config.update_from_raw(&raw)
}

/// Load the common configuration file: `all-services`, overlaid with the service
/// type's section when there is one.
fn load_common_config_from_file<C: Configuration>(
    location: &Path,
    service_type: &ServiceType,
    config: &mut C,
) -> Result<()> {
    let common = FileSource::new(location).load()?;
    let missing = |section: &str| ConfigError::MissingSection {
        section: section.to_string(),
        location: location.display().to_string(),
    };

    let mut all_services = common
        .get_mapping(ALL_SERVICES_KEY)
        .cloned()
        .ok_or_else(|| missing(ALL_SERVICES_KEY))?;

    if let Some(type_section) = service_type.section_key() {
        info!(service_type = %service_type, "Loading the common configuration for service type");
        let type_tree = common.get_mapping(type_section).ok_or_else(|| missing(type_section))?;
        merge_trees(&mut all_services, type_tree);
    }

    merge_values(config, &all_services)
}

/// Merge the top-level keys of `source` that `target` declares.
fn merge_declared<T>(target: &mut T, mut source: ConfigTree) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let declared = ConfigTree::from_serializable(target)?;
    source.retain(|key, _| declared.get(key).is_some());
    merge_values(target, &source)
}

/// Boolean spellings a key/value provider may hold.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
