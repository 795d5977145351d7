//! Bootstrap options for the resolution engine.

use crate::core::StartupTimer;
use crate::error::{ConfigError, Result};
use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Flags controlling how a service resolves its configuration.
///
/// Usually filled from command-line flags by the host application, or from the
/// environment with [`BootstrapOptions::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootstrapOptions {
    /// Push the private file configuration to the provider even if it already has one
    pub overwrite_config: bool,
    /// Provider URL such as `consul.http://localhost:8500`; unset means files only
    pub config_provider_url: Option<String>,
    /// Directory holding configuration files
    pub config_dir: String,
    /// Profile sub-directory of `config_dir`, may be empty
    pub profile: String,
    /// Name of the private configuration file
    pub config_file_name: String,
    /// Common configuration file used when no provider is configured
    pub common_config: Option<String>,
    /// Redirect host settings to `localhost` after resolution
    pub dev_mode: bool,
    /// How long start-up waits for the provider and the common configuration
    pub startup_duration_secs: u64,
    /// Pause between start-up polls
    pub startup_interval_secs: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            overwrite_config: false,
            config_provider_url: None,
            config_dir: "res".to_string(),
            profile: String::new(),
            config_file_name: "configuration.yaml".to_string(),
            common_config: None,
            dev_mode: false,
            startup_duration_secs: 60,
            startup_interval_secs: 1,
        }
    }
}

impl BootstrapOptions {
    /// Read options from `{prefix}_`-prefixed environment variables.
    ///
    /// Variable names are the field names in upper case, e.g. `EDGEX_CONFIG_DIR` or
    /// `EDGEX_DEV_MODE=true`. Unset fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if a variable has the wrong type.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::load(Environment::with_prefix(prefix))
    }

    /// Like [`from_env`](Self::from_env), reading from the given variables instead of
    /// the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if a variable has the wrong type.
    pub fn from_env_vars<I, K, V>(prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::load(Environment::with_prefix(prefix).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self> {
        Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ConfigError::Parse(format!("Failed to read bootstrap options: {}", e)))
    }

    /// Path of the private configuration file: `config_dir/profile/config_file_name`.
    pub fn config_file_location(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.config_dir);
        if !self.profile.is_empty() {
            path.push(&self.profile);
        }
        path.push(&self.config_file_name);
        path
    }

    /// A timer covering the start-up wait.
    pub fn startup_timer(&self) -> StartupTimer {
        StartupTimer::new(
            Duration::from_secs(self.startup_duration_secs),
            Duration::from_secs(self.startup_interval_secs),
        )
    }
}
