//! File-based configuration snapshots.

use crate::error::{ConfigError, Result};
use crate::tree::ConfigTree;
use std::path::{Path, PathBuf};
use tracing::info;

/// Supported document formats, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
    Json,
}

/// File-based configuration source.
///
/// Reads a YAML, TOML, or JSON document into an untyped [`ConfigTree`], with the
/// format detected from the file extension.
///
/// # Examples
///
/// ```rust,no_run
/// use layered_config::sources::FileSource;
///
/// # fn example() -> layered_config::error::Result<()> {
/// let tree = FileSource::new("res/configuration.yaml").load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a new file source.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Determine the document format from the file extension.
    fn format(&self) -> Result<Format> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::Parse(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            "json" => Ok(Format::Json),
            _ => Err(ConfigError::Parse(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }

    /// Read and parse the file.
    ///
    /// An empty document yields an empty tree.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Io`] if the file cannot be read
    /// - [`ConfigError::Parse`] if the extension is unsupported or the content is malformed
    pub fn load(&self) -> Result<ConfigTree> {
        let format = self.format()?;

        info!(path = %self.path.display(), "Loading configuration file");
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to read configuration file {}: {}", self.path.display(), e),
            )
        })?;

        if contents.trim().is_empty() {
            return Ok(ConfigTree::new());
        }

        parse(format, &contents).map_err(|e| {
            ConfigError::Parse(format!(
                "failed to unmarshal configuration file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Human-readable name for logging.
    pub fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn parse(format: Format, contents: &str) -> std::result::Result<ConfigTree, String> {
    match format {
        #[cfg(feature = "yaml")]
        Format::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        #[cfg(feature = "toml")]
        Format::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
        #[allow(unreachable_patterns)]
        other => Err(format!("support for {:?} documents is not enabled", other)),
    }
}
