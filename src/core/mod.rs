//! Core configuration management types.

mod builder;
mod configuration;
mod pipeline;
mod provider;
mod resolver;
mod snapshot;

pub use builder::ConfigurationProviderBuilder;
pub use configuration::Configuration;
pub use pipeline::{PropertyFilter, ValuePipeline, parse_duration};
pub use provider::{ConfigurationProvider, SourceDiscovery};
pub use resolver::ConfigurationResolver;
pub use snapshot::{ConfigurationSnapshot, PropertyChange, PropertyValue, SourceFailure};
