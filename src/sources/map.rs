//! In-memory property source.

use super::PropertySource;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory property source.
///
/// The owner may change entries at any time with [`MapSource::set`] and
/// [`MapSource::remove`]; the resolver picks the changes up on the next merge.
///
/// # Examples
///
/// ```rust
/// use tiered_config::sources::{MapSource, PropertySource};
///
/// let source = MapSource::new("defaults", 10)
///     .with_entry("server.port", "8080")
///     .with_entry("server.host", "localhost");
///
/// assert_eq!(source.ordinal(), 10);
/// assert_eq!(source.entries().unwrap().len(), 2);
/// ```
pub struct MapSource {
    name: String,
    ordinal: i32,
    entries: RwLock<BTreeMap<String, String>>,
}

impl MapSource {
    /// Create an empty in-memory source.
    pub fn new(name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            name: name.into(),
            ordinal,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a source pre-populated from any key/value iterator.
    pub fn from_entries<I, K, V>(name: impl Into<String>, ordinal: i32, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = Self::new(name, ordinal);
        {
            let mut map = source.entries.write();
            for (key, value) in entries {
                map.insert(key.into(), value.into());
            }
        }
        source
    }

    /// Add an entry while building the source.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.write().insert(key.into(), value.into());
        self
    }

    /// Set or replace an entry. Returns the previous value, if any.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.write().insert(key.into(), value.into())
    }

    /// Remove an entry. Returns the removed value, if any.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.read().clone())
    }
}
