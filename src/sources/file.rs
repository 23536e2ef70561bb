//! File-based property source.

use super::PropertySource;
use super::flatten::flatten_table;
use crate::error::{ConfigError, Result};
use config::{File, Source};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File-based property source.
///
/// Loads YAML, TOML, or JSON files with format detection based on the file
/// extension, and flattens nested tables into dotted keys
/// (`server: { port: 8080 }` becomes `server.port = "8080"`).
///
/// The file is re-read on every merge, so editing it and calling
/// `ConfigurationProvider::refresh` picks the change up.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::sources::FileSource;
///
/// let source = FileSource::new("config/default.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    ordinal: i32,
}

impl FileSource {
    /// Create a new file source with automatic format detection.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ordinal: 100,
        }
    }

    /// Set the ordinal for this source.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::source_read(
                    self.name(),
                    format!("unable to determine file format for: {}", self.path.display()),
                )
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ConfigError::source_read(
                self.name(),
                format!(
                    "unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                    extension
                ),
            )),
        }
    }
}

impl PropertySource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(ConfigError::source_read(
                self.name(),
                format!("file not found: {}", self.path.display()),
            ));
        }

        // The config crate picks the parser from the extension
        let values = File::from(self.path.clone())
            .required(true)
            .collect()
            .map_err(|e| ConfigError::source_read(self.name(), e))?;

        Ok(flatten_table(values))
    }
}
