//! Configuration provider with lazy initialization and atomic refresh.

use crate::core::{
    Configuration, ConfigurationProviderBuilder, ConfigurationResolver, ConfigurationSnapshot,
    PropertyChange, SourceFailure, ValuePipeline,
};
use crate::error::panic_message;
use crate::events::{ConfigurationChanged, EventBus};
use crate::sources::PropertySource;
use arc_swap::ArcSwapOption;
use chrono::Utc;
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Supplies property sources discovered at merge time.
///
/// Called on the first `get_configuration` and on every `refresh`, so a
/// discovery may return a different set each time. A discovery that panics
/// contributes no sources to that merge and is recorded in
/// [`ConfigurationSnapshot::failures`] as `discovery[<index>]`.
pub trait SourceDiscovery: Send + Sync {
    /// Return the currently available sources, in registration order.
    fn discover(&self) -> Vec<Arc<dyn PropertySource>>;
}

impl<F> SourceDiscovery for F
where
    F: Fn() -> Vec<Arc<dyn PropertySource>> + Send + Sync,
{
    fn discover(&self) -> Vec<Arc<dyn PropertySource>> {
        self()
    }
}

/// Owns the sources and serves the current [`Configuration`].
///
/// The first call to [`get_configuration`](Self::get_configuration) merges all
/// sources; later calls return the cached snapshot until
/// [`refresh`](Self::refresh) installs a new one. Both are safe to call from
/// any number of threads: concurrent first calls converge on one snapshot, and
/// a refresh swaps the snapshot pointer atomically so readers see either the
/// old or the new view, never a mix.
///
/// # Examples
///
/// ```rust
/// use tiered_config::prelude::*;
/// use std::sync::Arc;
///
/// let overrides = Arc::new(MapSource::new("overrides", 10));
/// let provider = ConfigurationProvider::builder()
///     .with_source(MapSource::new("defaults", 0).with_entry("mode", "safe"))
///     .with_shared_source(overrides.clone())
///     .build();
///
/// let before = provider.get_configuration();
/// overrides.set("mode", "fast");
/// provider.refresh();
///
/// assert_eq!(before.get("mode").as_deref(), Some("safe"));
/// assert_eq!(provider.get_configuration().get("mode").as_deref(), Some("fast"));
/// ```
pub struct ConfigurationProvider {
    sources: Vec<Arc<dyn PropertySource>>,
    discoveries: Vec<Arc<dyn SourceDiscovery>>,
    resolver: ConfigurationResolver,
    pipeline: Arc<ValuePipeline>,
    /// The current snapshot, swapped atomically on refresh
    current: ArcSwapOption<ConfigurationSnapshot>,
    /// Serializes initialization and refreshes
    update_lock: Mutex<()>,
    version: AtomicU64,
    event_bus: Option<EventBus>,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl ConfigurationProvider {
    /// Create a new builder for constructing a provider.
    pub fn builder() -> ConfigurationProviderBuilder {
        ConfigurationProviderBuilder::new()
    }

    pub(crate) fn from_parts(
        sources: Vec<Arc<dyn PropertySource>>,
        discoveries: Vec<Arc<dyn SourceDiscovery>>,
        pipeline: ValuePipeline,
        event_bus: Option<EventBus>,
    ) -> Self {
        Self {
            sources,
            discoveries,
            resolver: ConfigurationResolver::new(),
            pipeline: Arc::new(pipeline),
            current: ArcSwapOption::empty(),
            update_lock: Mutex::new(()),
            version: AtomicU64::new(0),
            event_bus,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<ConfigMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the current configuration, merging all sources on first use.
    pub fn get_configuration(&self) -> Configuration {
        if let Some(snapshot) = self.current.load_full() {
            return self.facade(snapshot);
        }

        let _guard = self.update_lock.lock();
        // Another thread may have initialized while we waited
        if let Some(snapshot) = self.current.load_full() {
            return self.facade(snapshot);
        }

        let snapshot = Arc::new(self.merge());
        self.current.store(Some(Arc::clone(&snapshot)));
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(version, keys = snapshot.len(), "Configuration initialized");

        self.facade(snapshot)
    }

    /// Re-merge all sources and atomically install the result.
    ///
    /// Returns the changes relative to the previous snapshot (all keys are
    /// `Added` if nothing was loaded yet). When the view changed and an event
    /// bus is attached, a [`ConfigurationChanged`] event is posted after the
    /// swap.
    pub fn refresh(&self) -> Vec<PropertyChange> {
        let (changes, snapshot, version) = {
            let _guard = self.update_lock.lock();

            let next = Arc::new(self.merge());
            let previous = self.current.swap(Some(Arc::clone(&next)));
            let changes = match previous {
                Some(previous) => previous.diff(&next),
                None => ConfigurationSnapshot::default().diff(&next),
            };
            let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
            (changes, next, version)
        };

        debug!(version, changes = changes.len(), "Configuration refreshed");

        if !changes.is_empty() {
            if let Some(bus) = &self.event_bus {
                bus.post(ConfigurationChanged {
                    version,
                    changes: changes.clone(),
                    configuration: self.facade(snapshot),
                    timestamp: Utc::now(),
                });
            }
        }

        changes
    }

    /// Number of snapshots installed so far (0 before first use).
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Whether a snapshot has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }

    /// The event bus change notifications are posted to, if any.
    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Names of all current sources, in registration order.
    pub fn source_names(&self) -> Vec<String> {
        let (sources, _) = self.collect_sources();
        sources.iter().map(|s| s.name()).collect()
    }

    fn collect_sources(&self) -> (Vec<Arc<dyn PropertySource>>, Vec<SourceFailure>) {
        let mut sources = self.sources.clone();
        let mut failures = Vec::new();

        for (index, discovery) in self.discoveries.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| discovery.discover())) {
                Ok(discovered) => sources.extend(discovered),
                Err(payload) => {
                    let failure = SourceFailure {
                        source: format!("discovery[{}]", index),
                        reason: format!("panicked: {}", panic_message(payload.as_ref())),
                    };
                    warn!(
                        source = %failure.source,
                        error = %failure.reason,
                        "Skipping source discovery"
                    );
                    failures.push(failure);
                }
            }
        }

        (sources, failures)
    }

    fn merge(&self) -> ConfigurationSnapshot {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_refresh());

        let (sources, discovery_failures) = self.collect_sources();
        let snapshot = self
            .resolver
            .merge(&sources)
            .with_earlier_failures(discovery_failures);

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_refresh(timer, snapshot.failures().len());
        }

        snapshot
    }

    fn facade(&self, snapshot: Arc<ConfigurationSnapshot>) -> Configuration {
        Configuration::new(snapshot, Arc::clone(&self.pipeline))
    }
}

impl std::fmt::Debug for ConfigurationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationProvider")
            .field("sources", &self.sources.len())
            .field("discoveries", &self.discoveries.len())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MapSource;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex as StdMutex};
    use std::thread;

    struct CountingSource {
        reads: AtomicUsize,
    }

    impl PropertySource for CountingSource {
        fn name(&self) -> String {
            "counting".to_string()
        }

        fn entries(&self) -> crate::error::Result<std::collections::BTreeMap<String, String>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok([("reads".to_string(), n.to_string())].into_iter().collect())
        }
    }

    #[test]
    fn test_lazy_initialization() {
        let source = Arc::new(CountingSource {
            reads: AtomicUsize::new(0),
        });
        let provider = ConfigurationProvider::builder()
            .with_shared_source(source.clone())
            .build();

        assert!(!provider.is_initialized());
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);

        let first = provider.get_configuration();
        let second = provider.get_configuration();
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(first.get("reads"), second.get("reads"));
        assert!(Arc::ptr_eq(first.snapshot(), second.snapshot()));
        assert_eq!(provider.version(), 1);
    }

    #[test]
    fn test_concurrent_initialization_converges() {
        let source = Arc::new(CountingSource {
            reads: AtomicUsize::new(0),
        });
        let provider = Arc::new(
            ConfigurationProvider::builder()
                .with_shared_source(source.clone())
                .build(),
        );

        let barrier = Arc::new(Barrier::new(8));
        let snapshots = Arc::new(StdMutex::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let barrier = Arc::clone(&barrier);
                let snapshots = Arc::clone(&snapshots);
                thread::spawn(move || {
                    barrier.wait();
                    let config = provider.get_configuration();
                    snapshots.lock().unwrap().push(Arc::clone(config.snapshot()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        let snapshots = snapshots.lock().unwrap();
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    }

    #[test]
    fn test_refresh_keeps_old_views_intact() {
        let source = Arc::new(MapSource::new("m", 0).with_entry("k", "v1"));
        let provider = ConfigurationProvider::builder()
            .with_shared_source(source.clone())
            .build();

        let old = provider.get_configuration();
        source.set("k", "v2");
        assert_eq!(provider.get_configuration().get("k").as_deref(), Some("v1"));

        let changes = provider.refresh();
        assert_eq!(
            changes,
            vec![PropertyChange::Updated {
                key: "k".to_string(),
                previous: "v1".to_string(),
                value: "v2".to_string()
            }]
        );
        assert_eq!(old.get("k").as_deref(), Some("v1"));
        assert_eq!(provider.get_configuration().get("k").as_deref(), Some("v2"));
        assert_eq!(provider.version(), 2);
    }

    #[test]
    fn test_refresh_before_first_read() {
        let provider = ConfigurationProvider::builder()
            .with_source(MapSource::new("m", 0).with_entry("a", "1"))
            .build();

        let changes = provider.refresh();
        assert_eq!(
            changes,
            vec![PropertyChange::Added {
                key: "a".to_string(),
                value: "1".to_string()
            }]
        );
        assert!(provider.is_initialized());
    }

    #[test]
    fn test_discovery_runs_per_merge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let provider = ConfigurationProvider::builder()
            .with_discovery(move || -> Vec<Arc<dyn PropertySource>> {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                let source: Arc<dyn PropertySource> =
                    Arc::new(MapSource::new("discovered", 0).with_entry("n", n.to_string()));
                vec![source]
            })
            .build();

        assert_eq!(provider.get_configuration().get("n").as_deref(), Some("0"));
        provider.refresh();
        assert_eq!(provider.get_configuration().get("n").as_deref(), Some("1"));
        assert_eq!(provider.source_names(), vec!["discovered".to_string()]);
    }

    #[test]
    fn test_panicking_discovery_is_skipped() {
        let provider = ConfigurationProvider::builder()
            .with_source(MapSource::new("static", 0).with_entry("a", "1"))
            .with_discovery(|| -> Vec<Arc<dyn PropertySource>> { panic!("discovery down") })
            .build();

        let config = provider.get_configuration();
        assert_eq!(config.get("a").as_deref(), Some("1"));

        let failures = config.snapshot().failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, "discovery[0]");
        assert!(failures[0].reason.contains("discovery down"));

        // Refresh takes the same path and keeps serving the static sources
        assert!(provider.refresh().is_empty());
        assert_eq!(provider.source_names(), vec!["static".to_string()]);
    }

    #[test]
    fn test_refresh_posts_change_event() {
        let bus = EventBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = bus.subscribe(move |event: &ConfigurationChanged| {
            seen_clone
                .lock()
                .unwrap()
                .push((event.version, event.changes.len()));
            Ok(())
        });

        let source = Arc::new(MapSource::new("m", 0).with_entry("k", "v1"));
        let provider = ConfigurationProvider::builder()
            .with_shared_source(source.clone())
            .with_event_bus(bus)
            .build();

        provider.get_configuration();
        provider.refresh(); // no change, no event
        source.set("k", "v2");
        provider.refresh();

        assert_eq!(*seen.lock().unwrap(), vec![(3, 1)]);
    }
}
