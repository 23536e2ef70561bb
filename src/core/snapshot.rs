//! Immutable merge results.

use std::collections::BTreeMap;

/// A resolved property value together with the name of the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    value: String,
    origin: String,
}

impl PropertyValue {
    pub(crate) fn new(value: String, origin: String) -> Self {
        Self { value, origin }
    }

    /// The raw value, before any read-time filter.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Name of the source that won precedence for this key.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// A property source that was skipped during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Name of the skipped source
    pub source: String,
    /// Why it was skipped
    pub reason: String,
}

/// A single difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyChange {
    /// The key is new.
    Added {
        /// The property key
        key: String,
        /// The new value
        value: String,
    },
    /// The key is gone.
    Removed {
        /// The property key
        key: String,
        /// The value before removal
        previous: String,
    },
    /// The key changed value.
    Updated {
        /// The property key
        key: String,
        /// The value before the change
        previous: String,
        /// The value after the change
        value: String,
    },
}

impl PropertyChange {
    /// The key this change refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Updated { key, .. } => key,
        }
    }
}

/// Result of merging a set of property sources.
///
/// Snapshots are immutable. A refresh produces a new snapshot; readers holding
/// the previous one keep seeing it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    properties: BTreeMap<String, PropertyValue>,
    failures: Vec<SourceFailure>,
}

impl ConfigurationSnapshot {
    pub(crate) fn new(
        properties: BTreeMap<String, PropertyValue>,
        failures: Vec<SourceFailure>,
    ) -> Self {
        Self {
            properties,
            failures,
        }
    }

    /// Record failures that happened before the merge, ahead of the
    /// resolver's own.
    pub(crate) fn with_earlier_failures(mut self, mut earlier: Vec<SourceFailure>) -> Self {
        if !earlier.is_empty() {
            earlier.append(&mut self.failures);
            self.failures = earlier;
        }
        self
    }

    /// Look up the resolved value and origin of a key.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Iterate over all resolved properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of resolved keys.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no key resolved.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Sources that were skipped while building this snapshot.
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// Compute the changes that turn `self` into `next`, sorted by key.
    pub fn diff(&self, next: &ConfigurationSnapshot) -> Vec<PropertyChange> {
        let mut changes = Vec::new();

        for (key, old) in &self.properties {
            match next.properties.get(key) {
                None => changes.push(PropertyChange::Removed {
                    key: key.clone(),
                    previous: old.value.clone(),
                }),
                Some(new) if new.value != old.value => changes.push(PropertyChange::Updated {
                    key: key.clone(),
                    previous: old.value.clone(),
                    value: new.value.clone(),
                }),
                Some(_) => {}
            }
        }

        for (key, new) in &next.properties {
            if !self.properties.contains_key(key) {
                changes.push(PropertyChange::Added {
                    key: key.clone(),
                    value: new.value.clone(),
                });
            }
        }

        changes.sort_by(|a, b| a.key().cmp(b.key()));
        changes
    }
}
