//! # tiered-config
//!
//! Layered configuration resolution with a decoupled event notification bus.
//!
//! ## Overview
//!
//! `tiered-config` merges key/value properties from any number of sources into
//! one immutable view:
//! - Each source carries an ordinal; higher ordinals override lower ones
//! - Ties are broken by registration order (later wins)
//! - Reads are lock-free and never see a half-applied refresh (`arc-swap`)
//! - A failing or panicking source is skipped and recorded, never fatal
//!
//! Alongside it, an [`EventBus`](events::EventBus) delivers events by their
//! concrete type to every registered listener, isolating listener failures
//! from the publisher and from each other. A refresh that changes the merged
//! view posts a [`ConfigurationChanged`](events::ConfigurationChanged) event.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_config::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     server: ServerConfig,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct ServerConfig {
//!     port: u16,
//! }
//!
//! # fn example() -> tiered_config::error::Result<()> {
//! let bus = EventBus::new();
//! let _watch = bus.subscribe(|event: &ConfigurationChanged| {
//!     println!("config v{} changed", event.version);
//!     Ok(())
//! });
//!
//! // Files first, then APP_* environment variables on top
//! let provider = ConfigurationProvider::builder()
//!     .with_file("config/default.yaml")
//!     .with_env_overrides("APP", "__")
//!     .with_event_bus(bus)
//!     .build();
//!
//! let config = provider.get_configuration();
//! let port: u16 = config.get_as_or("server.port", 8080)?;
//! let app: AppConfig = config.bind()?;
//! println!("Server port: {} / {}", port, app.server.port);
//!
//! // Pick up edited files and environment
//! provider.refresh();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml`, `toml`, `json` (default): file formats understood by `FileSource`
//! - `metrics`: OpenTelemetry instruments for refreshes and event dispatch
//!
//! ```toml
//! [dependencies]
//! tiered-config = { version = "0.1", features = ["metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod events;
pub mod global;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        Configuration, ConfigurationProvider, ConfigurationProviderBuilder, ConfigurationResolver,
        PropertyChange, PropertyFilter,
    };
    pub use crate::error::{ConfigError, Result};
    pub use crate::events::{
        ConfigurationChanged, DeadEvent, EventBus, Handler, HandlerResult, Listener, Registrar,
    };
    pub use crate::sources::{EnvSource, FileSource, MapSource, PropertySource};
}
