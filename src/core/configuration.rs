//! Typed service configuration capability.

use crate::error::Result;
use crate::secrets::InsecureSecrets;
use crate::tree::{ConfigTree, merge_values};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Section holding the settings that can change while the service runs.
pub const WRITABLE_KEY: &str = "Writable";
/// Common section shared by every service.
pub const ALL_SERVICES_KEY: &str = "all-services";
/// Common section shared by application services.
pub const APP_SERVICES_KEY: &str = "app-services";
/// Common section shared by device services.
pub const DEVICE_SERVICES_KEY: &str = "device-services";
/// Service key under which the common sections are stored.
pub const CORE_COMMON_CONFIG_SERVICE_KEY: &str = "core-common-config-bootstrapper";
/// Marker set once the common configuration has been seeded.
pub const COMMON_CONFIG_DONE: &str = "IsCommonConfigReady";

/// The capabilities the engine needs from a service's typed configuration.
///
/// Implementors are plain serde structs. Opt into schema-checked merges with
/// `#[serde(deny_unknown_fields)]` so overlays naming undeclared fields fail with
/// [`ConfigError::UnknownField`](crate::error::ConfigError::UnknownField).
///
/// # Examples
///
/// ```rust
/// use layered_config::core::Configuration;
/// use layered_config::secrets::InsecureSecrets;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// #[serde(rename_all = "PascalCase", deny_unknown_fields)]
/// struct Writable {
///     log_level: String,
/// }
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// #[serde(rename_all = "PascalCase", deny_unknown_fields)]
/// struct ServiceConfig {
///     writable: Writable,
/// }
///
/// impl Configuration for ServiceConfig {
///     type Writable = Writable;
///
///     fn log_level(&self) -> &str {
///         &self.writable.log_level
///     }
///
///     fn telemetry_interval(&self) -> &str {
///         ""
///     }
///
///     fn insecure_secrets(&self) -> Option<&InsecureSecrets> {
///         None
///     }
///
///     fn writable(&self) -> &Writable {
///         &self.writable
///     }
///
///     fn writable_mut(&mut self) -> &mut Writable {
///         &mut self.writable
///     }
/// }
/// ```
pub trait Configuration: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The live-updatable sub-structure stored under [`WRITABLE_KEY`].
    type Writable: Serialize + DeserializeOwned + Send + Sync;

    /// Current log level name.
    fn log_level(&self) -> &str;

    /// Current telemetry reporting interval, as a duration string such as `30s`.
    fn telemetry_interval(&self) -> &str;

    /// Insecure secrets, if the service declares any.
    fn insecure_secrets(&self) -> Option<&InsecureSecrets>;

    /// The writable sub-structure.
    fn writable(&self) -> &Self::Writable;

    /// The writable sub-structure, mutably.
    fn writable_mut(&mut self) -> &mut Self::Writable;

    /// Update fields from a raw provider snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not fit the schema.
    fn update_from_raw(&mut self, raw: &ConfigTree) -> Result<()> {
        merge_values(self, raw)
    }

    /// Point every host setting at `host`.
    ///
    /// Called in development mode, where the service runs outside the container
    /// network but the common configuration names container hosts.
    fn apply_dev_mode_host(&mut self, _host: &str) {}
}

/// Kind of service, which decides the extra common section it reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceType {
    /// Application service, reads `app-services`
    App,
    /// Device service, reads `device-services`
    Device,
    /// Any other service, reads `all-services` only
    #[default]
    Other,
}

impl ServiceType {
    /// Parse the conventional type name (`app-service`, `device-service`).
    pub fn from_name(name: &str) -> Self {
        match name {
            "app-service" => ServiceType::App,
            "device-service" => ServiceType::Device,
            _ => ServiceType::Other,
        }
    }

    /// The type-specific common section, if any.
    pub fn section_key(&self) -> Option<&'static str> {
        match self {
            ServiceType::App => Some(APP_SERVICES_KEY),
            ServiceType::Device => Some(DEVICE_SERVICES_KEY),
            ServiceType::Other => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::App => f.write_str("app-service"),
            ServiceType::Device => f.write_str("device-service"),
            ServiceType::Other => f.write_str("service"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_sections() {
        assert_eq!(ServiceType::from_name("app-service").section_key(), Some("app-services"));
        assert_eq!(ServiceType::from_name("device-service").section_key(), Some("device-services"));
        assert_eq!(ServiceType::from_name("core-data").section_key(), None);
    }

    #[test]
    fn test_service_type_display_round_trips() {
        for service_type in [ServiceType::App, ServiceType::Device] {
            assert_eq!(ServiceType::from_name(&service_type.to_string()), service_type);
        }
    }
}
