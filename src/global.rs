//! Process-wide provider for call sites that cannot take one as a parameter.
//!
//! Prefer passing a [`ConfigurationProvider`] explicitly. This module only
//! holds an atomically swappable reference to one, so the outermost layer of
//! an application can install it once and reach it from anywhere.
//!
//! # Examples
//!
//! ```rust
//! use tiered_config::global;
//! use tiered_config::prelude::*;
//!
//! global::install(
//!     ConfigurationProvider::builder()
//!         .with_source(MapSource::new("defaults", 0).with_entry("app.name", "demo"))
//!         .build(),
//! );
//!
//! assert_eq!(global::configuration().get("app.name").as_deref(), Some("demo"));
//! ```

use crate::core::{Configuration, ConfigurationProvider, PropertyChange};
use crate::sources::EnvSource;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::debug;

static PROVIDER: ArcSwapOption<ConfigurationProvider> = ArcSwapOption::const_empty();

/// Install `provider` as the process-wide provider, replacing any previous one.
///
/// Readers holding a `Configuration` from the old provider keep it.
pub fn install(provider: ConfigurationProvider) -> Arc<ConfigurationProvider> {
    let provider = Arc::new(provider);
    PROVIDER.store(Some(Arc::clone(&provider)));
    debug!("Installed global configuration provider");
    provider
}

/// The process-wide provider.
///
/// If none was installed, a provider over all environment variables is
/// installed on first use. Concurrent first calls agree on one instance.
pub fn provider() -> Arc<ConfigurationProvider> {
    if let Some(provider) = PROVIDER.load_full() {
        return provider;
    }

    let fallback = Arc::new(
        ConfigurationProvider::builder()
            .with_source(EnvSource::all())
            .build(),
    );
    let previous = PROVIDER.rcu(|current| match current {
        Some(existing) => Some(Arc::clone(existing)),
        None => Some(Arc::clone(&fallback)),
    });

    match previous {
        Some(existing) => existing,
        None => {
            debug!("Installed default environment-backed configuration provider");
            fallback
        }
    }
}

/// Current configuration of the process-wide provider.
pub fn configuration() -> Configuration {
    provider().get_configuration()
}

/// Refresh the process-wide provider.
pub fn refresh() -> Vec<PropertyChange> {
    provider().refresh()
}

/// Whether a provider has been installed, explicitly or by first use.
pub fn is_installed() -> bool {
    PROVIDER.load().is_some()
}
