//! Environment variable overrides.

use crate::error::{ConfigError, Result};
use crate::tree::{ConfigTree, ConfigValue, KeyPath, Scalar};
use config::{Environment, Source};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, info};

/// Applies externally supplied overrides onto configuration.
///
/// Overrides only ever replace values that already exist; they never introduce keys.
pub trait Overrides: Send + Sync {
    /// Override leaves of `tree` in place, returning how many were replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if an override value cannot be coerced to the type of the
    /// value it replaces.
    fn override_tree(&self, tree: &mut ConfigTree) -> Result<usize>;
}

/// Apply `overrides` to a typed configuration, returning how many were applied.
///
/// The typed value is only rewritten when at least one override matched.
///
/// # Errors
///
/// Returns an error if the configuration cannot be converted to and from a tree or an
/// override value has the wrong type.
pub fn override_configuration<T>(overrides: &dyn Overrides, target: &mut T) -> Result<usize>
where
    T: Serialize + DeserializeOwned,
{
    let mut tree = ConfigTree::from_serializable(target)?;
    let count = overrides.override_tree(&mut tree)?;
    if count > 0 {
        *target = tree.to_typed()?;
    }
    Ok(count)
}

/// Environment variable override source.
///
/// A variable overrides the leaf whose path, with segments joined by the separator,
/// matches the variable name case-insensitively. With the default `_` separator,
/// `WRITABLE_LOGLEVEL=DEBUG` overrides `Writable.LogLevel`.
///
/// # Examples
///
/// ```rust
/// use layered_config::sources::{EnvOverrides, Overrides};
/// use layered_config::tree::ConfigTree;
///
/// let overrides = EnvOverrides::new()
///     .with_vars([("WRITABLE_LOGLEVEL", "DEBUG")]);
///
/// let mut tree = ConfigTree::new().with("Writable", ConfigTree::new().with("LogLevel", "INFO"));
/// assert_eq!(overrides.override_tree(&mut tree).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    prefix: Option<String>,
    separator: String,
    vars: Option<HashMap<String, String>>,
}

impl EnvOverrides {
    /// Create an override source reading unprefixed variables with the `_` separator.
    pub fn new() -> Self {
        Self {
            prefix: None,
            separator: "_".to_string(),
            vars: None,
        }
    }

    /// Only consider variables starting with `prefix` followed by the separator.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Use a different separator between path segments.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Read variables from the given set instead of the process environment.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Collect matching variables keyed by lowercase dotted path.
    fn collect(&self) -> Result<HashMap<String, String>> {
        let mut environment = match &self.prefix {
            Some(prefix) => Environment::with_prefix(prefix),
            None => Environment::default(),
        }
        .separator(&self.separator);

        if let Some(vars) = &self.vars {
            environment = environment.source(Some(vars.clone().into_iter().collect()));
        }

        let collected = environment.collect().map_err(|e| {
            ConfigError::Parse(format!("Failed to load environment variables: {}", e))
        })?;

        collected
            .into_iter()
            .map(|(key, value)| {
                let value = value.into_string().map_err(|e| {
                    ConfigError::Parse(format!("Failed to read environment variable {}: {}", key, e))
                })?;
                Ok((key.to_lowercase(), value))
            })
            .collect()
    }
}

impl Default for EnvOverrides {
    fn default() -> Self {
        Self::new()
    }
}

impl Overrides for EnvOverrides {
    fn override_tree(&self, tree: &mut ConfigTree) -> Result<usize> {
        let vars = self.collect()?;
        if vars.is_empty() {
            return Ok(0);
        }

        let targets: Vec<(KeyPath, ConfigValue)> = tree
            .leaves()
            .into_iter()
            .map(|(path, value)| (path, value.clone()))
            .collect();

        let mut count = 0;
        for (path, current) in targets {
            let lookup = path
                .segments()
                .iter()
                .map(|s| s.to_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            let Some(raw) = vars.get(&lookup) else {
                continue;
            };

            let value = coerce(raw, &current).map_err(|reason| {
                ConfigError::Conversion(format!("environment override for {}: {}", path, reason))
            })?;
            debug!(key = %path, "Applying environment override");
            tree.insert_path(&path, value);
            count += 1;
        }

        if count > 0 {
            info!(count, "Environment overrides applied");
        }
        Ok(count)
    }
}

/// Parse `raw` into the same shape as the value it replaces.
fn coerce(raw: &str, current: &ConfigValue) -> std::result::Result<ConfigValue, String> {
    let raw = raw.trim();
    match current {
        ConfigValue::Scalar(Scalar::Bool(_)) => raw
            .parse::<bool>()
            .map(ConfigValue::from)
            .map_err(|e| e.to_string()),
        ConfigValue::Scalar(Scalar::Integer(_)) => raw
            .parse::<i64>()
            .map(ConfigValue::from)
            .map_err(|e| e.to_string()),
        ConfigValue::Scalar(Scalar::Float(_)) => raw
            .parse::<f64>()
            .map(ConfigValue::from)
            .map_err(|e| e.to_string()),
        ConfigValue::Sequence(_) => Ok(ConfigValue::Sequence(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ConfigValue::from)
                .collect(),
        )),
        ConfigValue::Scalar(Scalar::String(_)) | ConfigValue::Scalar(Scalar::Null) => {
            Ok(ConfigValue::from(raw))
        }
        ConfigValue::Mapping(_) => Err("cannot override a whole section".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn tree() -> ConfigTree {
        ConfigTree::new()
            .with(
                "Writable",
                ConfigTree::new()
                    .with("LogLevel", "INFO")
                    .with("Telemetry", ConfigTree::new().with("Enabled", false)),
            )
            .with("Service", ConfigTree::new().with("Port", 59880i64))
            .with("Tags", ConfigValue::Sequence(vec![]))
    }

    #[test]
    fn test_no_matching_vars() {
        let overrides = EnvOverrides::new().with_vars([("UNRELATED_THING", "1")]);
        let mut tree = tree();
        assert_eq!(overrides.override_tree(&mut tree).unwrap(), 0);
        assert_eq!(tree, self::tree());
    }

    #[test]
    fn test_overrides_are_typed() {
        let overrides = EnvOverrides::new().with_vars([
            ("WRITABLE_LOGLEVEL", "DEBUG"),
            ("WRITABLE_TELEMETRY_ENABLED", "true"),
            ("SERVICE_PORT", "8080"),
            ("TAGS", "a, b"),
        ]);
        let mut tree = tree();

        assert_eq!(overrides.override_tree(&mut tree).unwrap(), 4);
        assert_eq!(
            tree.get_path(&KeyPath::parse("Writable.LogLevel")),
            Some(&ConfigValue::from("DEBUG"))
        );
        assert_eq!(
            tree.get_path(&KeyPath::parse("Writable.Telemetry.Enabled")),
            Some(&ConfigValue::from(true))
        );
        assert_eq!(
            tree.get_path(&KeyPath::parse("Service.Port")),
            Some(&ConfigValue::from(8080i64))
        );
        assert_eq!(
            tree.get("Tags"),
            Some(&ConfigValue::Sequence(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_bad_value_is_error() {
        let overrides = EnvOverrides::new().with_vars([("SERVICE_PORT", "eighty")]);
        let mut tree = tree();
        assert!(matches!(
            overrides.override_tree(&mut tree),
            Err(ConfigError::Conversion(_))
        ));
    }

    #[test]
    fn test_prefix() {
        let overrides = EnvOverrides::new()
            .with_prefix("APP")
            .with_vars([("APP_WRITABLE_LOGLEVEL", "TRACE"), ("WRITABLE_LOGLEVEL", "ERROR")]);
        let mut tree = tree();

        assert_eq!(overrides.override_tree(&mut tree).unwrap(), 1);
        assert_eq!(
            tree.get_path(&KeyPath::parse("Writable.LogLevel")),
            Some(&ConfigValue::from("TRACE"))
        );
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Typed {
        log_level: String,
    }

    #[test]
    fn test_override_configuration() {
        let overrides = EnvOverrides::new().with_vars([("LOGLEVEL", "WARN")]);
        let mut typed = Typed {
            log_level: "INFO".to_string(),
        };

        assert_eq!(override_configuration(&overrides, &mut typed).unwrap(), 1);
        assert_eq!(typed.log_level, "WARN");
    }
}
