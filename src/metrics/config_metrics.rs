//! Configuration metrics tracking using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for configuration and event bus operations.
///
/// Cloning shares the underlying instruments, so one collector can be handed
/// to both a provider and a bus.
///
/// # Examples
///
/// ```rust,no_run
/// use tiered_config::metrics::ConfigMetrics;
/// use opentelemetry::global;
///
/// let metrics = ConfigMetrics::new(global::meter("tiered-config"));
///
/// let timer = metrics.start_refresh();
/// // ... merge sources ...
/// metrics.record_refresh(timer, 0);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    refreshes: Counter<u64>,
    refresh_duration: Histogram<f64>,
    source_failures: Counter<u64>,
    config_age_seconds: Gauge<i64>,
    events_posted: Counter<u64>,
    listener_failures: Counter<u64>,
    registered_listeners: Gauge<i64>,
    last_update: Arc<Mutex<Instant>>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let refreshes = meter
            .u64_counter("tiered_config.refresh.count")
            .with_description("Number of snapshot merges installed")
            .build();

        let refresh_duration = meter
            .f64_histogram("tiered_config.refresh.duration")
            .with_description("Duration of source merges in seconds")
            .with_unit("s")
            .build();

        let source_failures = meter
            .u64_counter("tiered_config.source.failures")
            .with_description("Number of property sources skipped during merges")
            .build();

        let config_age_seconds = meter
            .i64_gauge("tiered_config.age")
            .with_description("Time since the last snapshot was installed in seconds")
            .with_unit("s")
            .build();

        let events_posted = meter
            .u64_counter("tiered_config.events.posted")
            .with_description("Number of events posted to the bus")
            .build();

        let listener_failures = meter
            .u64_counter("tiered_config.listener.failures")
            .with_description("Number of listener invocations that failed")
            .build();

        let registered_listeners = meter
            .i64_gauge("tiered_config.listeners.registered")
            .with_description("Number of distinct registered listeners")
            .build();

        Self {
            refreshes,
            refresh_duration,
            source_failures,
            config_age_seconds,
            events_posted,
            listener_failures,
            registered_listeners,
            last_update: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Start a refresh timer, to be passed to [`record_refresh`](Self::record_refresh).
    pub fn start_refresh(&self) -> Instant {
        Instant::now()
    }

    /// Record an installed snapshot and the number of sources it skipped.
    pub fn record_refresh(&self, start: Instant, skipped_sources: usize) {
        self.refreshes.add(1, &[]);
        self.refresh_duration.record(start.elapsed().as_secs_f64(), &[]);
        if skipped_sources > 0 {
            self.source_failures.add(skipped_sources as u64, &[]);
        }
        *self.last_update.lock() = Instant::now();
    }

    /// Update the configuration age metric.
    ///
    /// This should be called periodically to track how stale the configuration is.
    pub fn update_config_age(&self) {
        let age_secs = self.last_update.lock().elapsed().as_secs() as i64;
        self.config_age_seconds.record(age_secs, &[]);
    }

    /// Record one posted event.
    pub fn record_event_posted(&self) {
        self.events_posted.add(1, &[]);
    }

    /// Record one failed listener invocation.
    pub fn record_listener_failure(&self) {
        self.listener_failures.add(1, &[]);
    }

    /// Update the number of registered listeners.
    pub fn update_listener_count(&self, count: i64) {
        self.registered_listeners.record(count, &[]);
    }
}
