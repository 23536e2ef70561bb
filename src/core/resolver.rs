//! Resolver that merges property sources by ordinal.

use crate::core::snapshot::{ConfigurationSnapshot, PropertyValue, SourceFailure};
use crate::error::panic_message;
use crate::sources::{ORDINAL_KEY, PropertySource};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Entries read from one source, tagged with their effective ordinal.
struct Layer {
    name: String,
    ordinal: i32,
    entries: BTreeMap<String, String>,
}

/// Merges multiple property sources into one [`ConfigurationSnapshot`].
///
/// Sources are applied from lowest to highest ordinal, so a higher ordinal
/// overrides a lower one. Sources sharing an ordinal are applied in the order
/// they were given: the later one wins.
///
/// A source that fails (or panics) while enumerating is skipped and recorded
/// in [`ConfigurationSnapshot::failures`]; the merge itself never fails.
///
/// # Examples
///
/// ```rust
/// use tiered_config::core::ConfigurationResolver;
/// use tiered_config::sources::{MapSource, PropertySource};
/// use std::sync::Arc;
///
/// let sources: Vec<Arc<dyn PropertySource>> = vec![
///     Arc::new(MapSource::from_entries("a", 1, [("x", "1"), ("y", "2")])),
///     Arc::new(MapSource::from_entries("b", 5, [("y", "20"), ("z", "30")])),
/// ];
///
/// let snapshot = ConfigurationResolver::new().merge(&sources);
/// assert_eq!(snapshot.get("y").unwrap().value(), "20");
/// assert_eq!(snapshot.get("y").unwrap().origin(), "b");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationResolver;

impl ConfigurationResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Merge the given sources, in registration order, into a snapshot.
    pub fn merge(&self, sources: &[Arc<dyn PropertySource>]) -> ConfigurationSnapshot {
        let mut layers = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();

        for source in sources {
            match read_layer(source.as_ref()) {
                Ok(layer) => layers.push(layer),
                Err(failure) => {
                    warn!(
                        source = %failure.source,
                        error = %failure.reason,
                        "Skipping property source"
                    );
                    failures.push(failure);
                }
            }
        }

        // Stable sort keeps registration order among equal ordinals
        layers.sort_by_key(|layer| layer.ordinal);

        let mut properties = BTreeMap::new();
        for layer in layers {
            debug!(
                source = %layer.name,
                ordinal = layer.ordinal,
                keys = layer.entries.len(),
                "Applying property source"
            );
            for (key, value) in layer.entries {
                properties.insert(key, PropertyValue::new(value, layer.name.clone()));
            }
        }

        ConfigurationSnapshot::new(properties, failures)
    }
}

/// Name recorded for a source whose `name()` panicked.
const UNNAMED_SOURCE: &str = "<unnamed>";

fn read_layer(source: &dyn PropertySource) -> Result<Layer, SourceFailure> {
    let name = catch_unwind(AssertUnwindSafe(|| source.name())).map_err(|payload| SourceFailure {
        source: UNNAMED_SOURCE.to_string(),
        reason: format!("panicked: {}", panic_message(payload.as_ref())),
    })?;

    let read = catch_unwind(AssertUnwindSafe(|| (source.ordinal(), source.entries())));
    let (declared, entries) = read.map_err(|payload| SourceFailure {
        source: name.clone(),
        reason: format!("panicked: {}", panic_message(payload.as_ref())),
    })?;

    let entries = entries.map_err(|e| SourceFailure {
        source: name.clone(),
        reason: e.to_string(),
    })?;

    let ordinal = match entries.get(ORDINAL_KEY) {
        Some(raw) => match raw.trim().parse::<i32>() {
            Ok(ordinal) => ordinal,
            Err(e) => {
                warn!(
                    source = %name,
                    value = %raw,
                    error = %e,
                    "Ignoring unparsable ordinal entry"
                );
                declared
            }
        },
        None => declared,
    };

    Ok(Layer {
        name,
        ordinal,
        entries,
    })
}
