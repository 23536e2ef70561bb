//! Environment variable property source.

use super::PropertySource;
use super::flatten::flatten_table;
use crate::error::{ConfigError, Result};
use config::{Environment, Source};
use std::collections::BTreeMap;

/// Environment variable property source.
///
/// Reads environment variables with a given prefix, strips the prefix, lowercases
/// the remainder and turns the nesting separator into `.`.
///
/// # Examples
///
/// ```rust
/// use tiered_config::sources::{EnvSource, PropertySource};
///
/// // APP_SERVER__PORT=8080 -> server.port = 8080
/// let source = EnvSource::new("APP", "__");
/// assert_eq!(source.ordinal(), 300);
/// ```
pub struct EnvSource {
    prefix: Option<String>,
    separator: Option<String>,
    ordinal: i32,
}

impl EnvSource {
    /// Create a new environment variable source.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "APP")
    /// * `separator` - Separator for nested keys (e.g., "__" for APP_DB__HOST)
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        Self {
            prefix: Some(prefix.into()),
            separator: (!separator.is_empty()).then_some(separator),
            ordinal: 300, // Env vars override files by default
        }
    }

    /// Expose every environment variable, lowercased, without nesting.
    pub fn all() -> Self {
        Self {
            prefix: None,
            separator: None,
            ordinal: 300,
        }
    }

    /// Set the ordinal for this source.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    fn environment(&self) -> Environment {
        let mut env = match &self.prefix {
            Some(prefix) => Environment::with_prefix(prefix).prefix_separator("_"),
            None => Environment::default(),
        };
        if let Some(separator) = &self.separator {
            env = env.separator(separator);
        }
        env
    }
}

impl PropertySource for EnvSource {
    fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("env:{}*", prefix),
            None => "env:*".to_string(),
        }
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        let values = self
            .environment()
            .collect()
            .map_err(|e| ConfigError::source_read(self.name(), e))?;

        Ok(flatten_table(values))
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // For env var manipulation in tests
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_source_creation() {
        let source = EnvSource::new("APP", "__");
        assert_eq!(source.prefix.as_deref(), Some("APP"));
        assert_eq!(source.separator.as_deref(), Some("__"));
        assert_eq!(source.ordinal(), 300);
    }

    #[test]
    fn test_with_ordinal() {
        let source = EnvSource::new("APP", "__").with_ordinal(400);
        assert_eq!(source.ordinal(), 400);
    }

    #[test]
    fn test_name() {
        assert_eq!(EnvSource::new("APP", "__").name(), "env:APP*");
        assert_eq!(EnvSource::all().name(), "env:*");
    }

    #[test]
    fn test_empty_separator_means_no_nesting() {
        let source = EnvSource::new("APP", "");
        assert!(source.separator.is_none());
    }

    #[test]
    fn test_load_prefixed_vars() {
        unsafe {
            env::set_var("TIERED_ENV_UNIT_SERVER__PORT", "9090");
            env::set_var("TIERED_ENV_UNIT_NAME", "");
        }

        let source = EnvSource::new("TIERED_ENV_UNIT", "__");
        let entries = source.entries().unwrap();
        assert_eq!(entries.get("server.port").map(String::as_str), Some("9090"));
        assert_eq!(entries.get("name").map(String::as_str), Some(""));

        unsafe {
            env::remove_var("TIERED_ENV_UNIT_SERVER__PORT");
            env::remove_var("TIERED_ENV_UNIT_NAME");
        }
    }

    #[test]
    fn test_load_no_matches() {
        let source = EnvSource::new("TIERED_ENV_NONEXISTENT_PREFIX", "__");
        let entries = source.entries().unwrap();
        assert!(entries.is_empty());
    }
}
