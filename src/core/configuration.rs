//! Read-only configuration facade.

use crate::core::pipeline::ValuePipeline;
use crate::core::snapshot::ConfigurationSnapshot;
use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Typed, read-only view over one merged snapshot.
///
/// A `Configuration` never changes after it is handed out: a provider refresh
/// installs a new snapshot, while existing `Configuration` values keep reading
/// the one they were created from. Cloning is cheap (two `Arc` clones).
///
/// Every read is a pure function of the snapshot and the filter/converter
/// pipeline. Absent keys are `None`, which callers can tell apart from a key
/// configured to the empty string.
///
/// # Examples
///
/// ```rust
/// use tiered_config::prelude::*;
///
/// let provider = ConfigurationProvider::builder()
///     .with_source(MapSource::new("defaults", 0).with_entry("server.port", "8080"))
///     .build();
///
/// let config = provider.get_configuration();
/// assert_eq!(config.get("server.port").as_deref(), Some("8080"));
/// assert_eq!(config.get_as::<u16>("server.port").unwrap(), Some(8080));
/// assert_eq!(config.get("missing"), None);
/// ```
#[derive(Clone)]
pub struct Configuration {
    snapshot: Arc<ConfigurationSnapshot>,
    pipeline: Arc<ValuePipeline>,
}

impl Configuration {
    /// Wrap a snapshot with a value pipeline.
    pub fn new(snapshot: Arc<ConfigurationSnapshot>, pipeline: Arc<ValuePipeline>) -> Self {
        Self { snapshot, pipeline }
    }

    /// Wrap a snapshot with the default pipeline (no filters).
    pub fn from_snapshot(snapshot: ConfigurationSnapshot) -> Self {
        Self::new(Arc::new(snapshot), Arc::new(ValuePipeline::new()))
    }

    /// Get the filtered value of `key`, or `None` if it is not configured.
    pub fn get(&self, key: &str) -> Option<String> {
        let property = self.snapshot.get(key)?;
        self.pipeline.apply(key, property.value())
    }

    /// Get the value of `key`, falling back to `default` when absent.
    pub fn get_or_default(&self, key: &str, default: impl Into<String>) -> String {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Whether `key` resolves to a value (after filtering).
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy of all resolved key/value pairs, after filtering.
    ///
    /// The returned map is owned by the caller; mutating it has no effect on
    /// this configuration.
    pub fn get_properties(&self) -> BTreeMap<String, String> {
        self.snapshot
            .iter()
            .filter_map(|(key, property)| {
                self.pipeline
                    .apply(key, property.value())
                    .map(|value| (key.to_string(), value))
            })
            .collect()
    }

    /// Copy of all keys under `prefix.`, with the prefix stripped.
    ///
    /// ```rust
    /// # use tiered_config::prelude::*;
    /// let provider = ConfigurationProvider::builder()
    ///     .with_source(MapSource::from_entries(
    ///         "m",
    ///         0,
    ///         [("db.host", "h"), ("db.port", "5432"), ("dbx", "no")],
    ///     ))
    ///     .build();
    ///
    /// let db = provider.get_configuration().section("db");
    /// assert_eq!(db.len(), 2);
    /// assert_eq!(db["port"], "5432");
    /// ```
    pub fn section(&self, prefix: &str) -> BTreeMap<String, String> {
        let prefix = format!("{}.", prefix.trim_end_matches('.'));
        self.get_properties()
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|stripped| (stripped.to_string(), value))
            })
            .collect()
    }

    /// Read `key` as `T`.
    ///
    /// A converter registered for `T` takes priority; otherwise `T::from_str`
    /// is used. The value is parsed as stored first, and only retried with
    /// surrounding whitespace trimmed if that fails, so `get_as::<String>`
    /// returns exactly what [`get`](Self::get) does.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Conversion`] if the value is present but cannot be
    /// converted. A missing key is `Ok(None)`.
    pub fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr + 'static,
        T::Err: fmt::Display,
    {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        if let Some(converter) = self.pipeline.converter::<T>() {
            return converter(&value)
                .map(Some)
                .map_err(|e| conversion_error::<T>(key, e));
        }

        match value.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| conversion_error::<T>(key, e)),
        }
    }

    /// Read `key` as `T`, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is present but cannot be converted.
    pub fn get_as_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr + 'static,
        T::Err: fmt::Display,
    {
        Ok(self.get_as(key)?.unwrap_or(default))
    }

    /// Read `key` through the converter registered for `T`.
    ///
    /// Unlike [`get_as`](Self::get_as) this works for types without a
    /// `FromStr` impl, such as `std::time::Duration`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConverterMissing`] if no converter is registered
    /// for `T`, or [`ConfigError::Conversion`] if conversion fails.
    pub fn convert<T: 'static>(&self, key: &str) -> Result<Option<T>> {
        let converter = self.pipeline.converter::<T>().ok_or_else(|| {
            ConfigError::ConverterMissing {
                key: key.to_string(),
                target: type_name::<T>(),
            }
        })?;

        match self.get(key) {
            Some(value) => converter(&value)
                .map(Some)
                .map_err(|e| conversion_error::<T>(key, e)),
            None => Ok(None),
        }
    }

    /// Bind the whole view into a deserializable structure.
    ///
    /// Dotted keys become nested tables (`server.port` fills `server: { port }`)
    /// and string values are coerced to the field types by the `config` crate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationError`] if keys collide
    /// structurally or a field cannot be deserialized.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        let mut builder = config::Config::builder();
        for (key, value) in self.get_properties() {
            builder = builder.set_override(key.as_str(), value).map_err(|e| {
                ConfigError::DeserializationError(format!("Failed to set '{}': {}", key, e))
            })?;
        }

        let config = builder.build().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to build configuration: {}", e))
        })?;

        config
            .try_deserialize::<T>()
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// The unfiltered winning value of `key`.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.snapshot.get(key).map(|p| p.value())
    }

    /// Name of the source that supplied `key`.
    pub fn origin(&self, key: &str) -> Option<&str> {
        self.snapshot.get(key).map(|p| p.origin())
    }

    /// The snapshot backing this view.
    pub fn snapshot(&self) -> &Arc<ConfigurationSnapshot> {
        &self.snapshot
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("keys", &self.snapshot.len())
            .field("failures", &self.snapshot.failures().len())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

fn conversion_error<T>(key: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Conversion {
        key: key.to_string(),
        target: type_name::<T>(),
        reason: reason.to_string(),
    }
}
