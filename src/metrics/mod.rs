//! Built-in metrics for configuration and event bus operations.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Refresh count and duration
//! - Skipped property sources
//! - Configuration age
//! - Events posted and listener failures
//! - Registered listeners
//!
//! # Examples
//!
//! ```rust,no_run
//! use tiered_config::prelude::*;
//! use tiered_config::metrics::ConfigMetrics;
//! use opentelemetry::global;
//!
//! let metrics = ConfigMetrics::new(global::meter("my-app"));
//!
//! let bus = EventBus::builder().with_metrics(metrics.clone()).build();
//! let provider = ConfigurationProvider::builder()
//!     .with_file("config.yaml")
//!     .with_event_bus(bus)
//!     .with_metrics(metrics)
//!     .build();
//! ```

mod config_metrics;

pub use config_metrics::ConfigMetrics;
