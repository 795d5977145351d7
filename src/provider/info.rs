//! Configuration provider location.

use crate::error::{ConfigError, Result};
use std::fmt;
use url::Url;

/// Where the configuration provider lives and what kind it is.
///
/// Parsed from a URL of the form `{type}.{protocol}://{host}:{port}`, for example
/// `consul.http://localhost:8500`. An empty URL means no provider is used and
/// configuration is resolved from files only.
///
/// # Examples
///
/// ```rust
/// use layered_config::provider::ProviderInfo;
///
/// let info = ProviderInfo::from_url("consul.http://localhost:8500").unwrap();
/// assert!(info.use_provider());
/// assert_eq!(info.provider_type(), "consul");
/// assert_eq!(info.protocol(), "http");
/// assert_eq!(info.host(), "localhost");
/// assert_eq!(info.port(), 8500);
///
/// assert!(!ProviderInfo::from_url("").unwrap().use_provider());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderInfo {
    endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    provider_type: String,
    protocol: String,
    host: String,
    port: u16,
}

impl ProviderInfo {
    /// Parse a provider URL. Blank input yields a file-only configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the URL is malformed, the scheme is not
    /// `{type}.{protocol}`, or the host or port is missing.
    pub fn from_url(provider_url: &str) -> Result<Self> {
        let provider_url = provider_url.trim();
        if provider_url.is_empty() {
            return Ok(Self::default());
        }

        let parsed = Url::parse(provider_url).map_err(|e| {
            ConfigError::Parse(format!("invalid configuration provider URL '{}': {}", provider_url, e))
        })?;

        let (provider_type, protocol) = parsed.scheme().split_once('.').ok_or_else(|| {
            ConfigError::Parse(format!(
                "configuration provider URL '{}' must use a '<type>.<protocol>' scheme",
                provider_url
            ))
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::Parse(format!("configuration provider URL '{}' has no host", provider_url)))?;

        let port = parsed
            .port()
            .ok_or_else(|| ConfigError::Parse(format!("configuration provider URL '{}' has no port", provider_url)))?;

        Ok(Self {
            endpoint: Some(Endpoint {
                provider_type: provider_type.to_string(),
                protocol: protocol.to_string(),
                host: host.to_string(),
                port,
            }),
        })
    }

    /// Whether a provider was configured.
    pub fn use_provider(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Provider kind, e.g. `consul`. Empty when no provider is configured.
    pub fn provider_type(&self) -> &str {
        self.endpoint.as_ref().map_or("", |e| e.provider_type.as_str())
    }

    /// Transport protocol, e.g. `http`.
    pub fn protocol(&self) -> &str {
        self.endpoint.as_ref().map_or("", |e| e.protocol.as_str())
    }

    /// Provider host name.
    pub fn host(&self) -> &str {
        self.endpoint.as_ref().map_or("", |e| e.host.as_str())
    }

    /// Provider port, 0 when no provider is configured.
    pub fn port(&self) -> u16 {
        self.endpoint.as_ref().map_or(0, |e| e.port)
    }

    /// The address clients connect to, e.g. `http://localhost:8500`.
    pub fn url(&self) -> String {
        match &self.endpoint {
            Some(e) => format!("{}://{}:{}", e.protocol, e.host, e.port),
            None => String::new(),
        }
    }
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(e) => write!(f, "{} at {}", e.provider_type, self.url()),
            None => f.write_str("no configuration provider"),
        }
    }
}
