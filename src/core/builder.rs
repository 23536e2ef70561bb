//! Builder for constructing ConfigurationProvider instances.

use crate::core::{ConfigurationProvider, PropertyFilter, SourceDiscovery, ValuePipeline};
use crate::error::BoxError;
use crate::events::EventBus;
use crate::sources::{EnvSource, FileSource, PropertySource};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Builder for constructing a [`ConfigurationProvider`].
///
/// Sources are registered in this order: files, custom sources, then the
/// environment source. Registration order only matters for sources with
/// equal ordinals, where the later one wins.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::prelude::*;
///
/// let provider = ConfigurationProvider::builder()
///     .with_file("config/default.yaml")
///     .with_file("config/production.yaml")
///     .with_env_overrides("APP", "__")
///     .build();
///
/// let port: Option<u16> = provider.get_configuration().get_as("server.port")?;
/// # Ok::<(), tiered_config::error::ConfigError>(())
/// ```
pub struct ConfigurationProviderBuilder {
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_sources: Vec<Arc<dyn PropertySource>>,
    discoveries: Vec<Arc<dyn SourceDiscovery>>,
    pipeline: ValuePipeline,
    event_bus: Option<EventBus>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl ConfigurationProviderBuilder {
    /// Create a new builder with no sources.
    pub fn new() -> Self {
        Self {
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_sources: Vec::new(),
            discoveries: Vec::new(),
            pipeline: ValuePipeline::new(),
            event_bus: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a file source with automatic format detection.
    ///
    /// Supported formats: YAML (.yaml, .yml), TOML (.toml), JSON (.json).
    /// Files get ordinals 100, 110, 120, ... in the order they are added, so
    /// later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Add an environment variable source with the given prefix.
    ///
    /// `APP_SERVER__PORT=8080` with prefix `APP` and separator `__` becomes
    /// `server.port = 8080`. The source has ordinal 300.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom property source.
    pub fn with_source<S: PropertySource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Arc::new(source));
        self
    }

    /// Add a source the caller keeps a handle to, e.g. a [`MapSource`] that is
    /// mutated before a refresh.
    ///
    /// [`MapSource`]: crate::sources::MapSource
    pub fn with_shared_source<S: PropertySource + 'static>(mut self, source: Arc<S>) -> Self {
        self.custom_sources.push(source);
        self
    }

    /// Add a discovery consulted on every merge.
    ///
    /// Discovered sources are appended after all statically registered ones.
    pub fn with_discovery<D: SourceDiscovery + 'static>(mut self, discovery: D) -> Self {
        self.discoveries.push(Arc::new(discovery));
        self
    }

    /// Add a value filter. Filters run in the order they are added.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tiered_config::prelude::*;
    ///
    /// let provider = ConfigurationProvider::builder()
    ///     .with_source(MapSource::new("m", 0).with_entry("db.password", "hunter2"))
    ///     .with_filter(|key: &str, value: &str| {
    ///         if key.ends_with("password") {
    ///             Some("***".to_string())
    ///         } else {
    ///             Some(value.to_string())
    ///         }
    ///     })
    ///     .build();
    ///
    /// let config = provider.get_configuration();
    /// assert_eq!(config.get("db.password").as_deref(), Some("***"));
    /// assert_eq!(config.raw("db.password"), Some("hunter2"));
    /// ```
    pub fn with_filter<F: PropertyFilter + 'static>(mut self, filter: F) -> Self {
        self.pipeline.add_filter(filter);
        self
    }

    /// Register a converter used by `Configuration::convert` and
    /// `Configuration::get_as` for type `T`.
    pub fn with_converter<T, F>(mut self, converter: F) -> Self
    where
        T: 'static,
        F: Fn(&str) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.pipeline.add_converter::<T, F>(converter);
        self
    }

    /// Post a `ConfigurationChanged` event to `bus` after each refresh that
    /// changes the merged view.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Record refresh metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ConfigMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the provider.
    ///
    /// Nothing is read until the first call to `get_configuration`; source
    /// failures at that point are recorded in the snapshot rather than
    /// returned.
    pub fn build(self) -> ConfigurationProvider {
        let mut sources: Vec<Arc<dyn PropertySource>> = Vec::new();

        // File sources with increasing ordinal
        for (index, path) in self.file_paths.iter().enumerate() {
            let ordinal = 100 + (index as i32 * 10); // 100, 110, 120, etc.
            sources.push(Arc::new(FileSource::new(path).with_ordinal(ordinal)));
        }

        sources.extend(self.custom_sources);

        if let (Some(prefix), Some(separator)) = (self.env_prefix, self.env_separator) {
            sources.push(Arc::new(EnvSource::new(prefix, separator)));
        }

        let provider = ConfigurationProvider::from_parts(
            sources,
            self.discoveries,
            self.pipeline,
            self.event_bus,
        );

        #[cfg(feature = "metrics")]
        let provider = provider.with_metrics(self.metrics);

        provider
    }
}

impl Default for ConfigurationProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
