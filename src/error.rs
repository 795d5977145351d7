//! Error types for layered-config.

/// Result type alias for layered-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while resolving or reconciling configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred, typically an unreadable configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration document.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration provider could not be reached.
    #[error("Configuration provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The common configuration readiness marker was never observed.
    #[error("Common configuration not ready: {0}")]
    CommonConfigTimeout(String),

    /// An overlay referenced a field the target schema does not declare.
    #[error("Unknown configuration field: {0}")]
    UnknownField(String),

    /// Conversion between a typed configuration and a tree failed.
    #[error("Configuration conversion failed: {0}")]
    Conversion(String),

    /// Applying an overlay onto a configuration failed.
    #[error("Failed to merge configuration: {0}")]
    Merge(String),

    /// A required section is missing from a configuration document.
    #[error("Missing configuration section '{section}' in {location}")]
    MissingSection {
        /// Name of the section that was expected
        section: String,
        /// Where the section was looked up
        location: String,
    },

    /// A provider client call failed.
    #[error("Configuration provider error: {0}")]
    Provider(String),

    /// A log level name could not be understood.
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// A duration string could not be parsed.
    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    /// A start-up wait was aborted by the cancellation signal.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ConfigError {
    /// Classify a serde_json error raised while converting a tree into a typed value.
    ///
    /// `deny_unknown_fields` rejections become [`ConfigError::UnknownField`]; everything
    /// else is a [`ConfigError::Conversion`].
    pub(crate) fn from_conversion(err: serde_json::Error) -> Self {
        let message = err.to_string();
        if message.starts_with("unknown field") {
            ConfigError::UnknownField(message)
        } else {
            ConfigError::Conversion(message)
        }
    }

    /// Whether this error came from the start-up wait being cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConfigError::Cancelled(_))
    }
}
