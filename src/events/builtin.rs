//! Events published by the library itself.

use crate::core::{Configuration, PropertyChange};
use crate::events::Event;
use chrono::{DateTime, Utc};
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// Posted by a `ConfigurationProvider` after a refresh changed the merged view.
#[derive(Debug, Clone)]
pub struct ConfigurationChanged {
    /// Snapshot version installed by the refresh
    pub version: u64,
    /// Changes relative to the previous snapshot, sorted by key
    pub changes: Vec<PropertyChange>,
    /// The configuration after the refresh
    pub configuration: Configuration,
    /// When the new snapshot was installed
    pub timestamp: DateTime<Utc>,
}

impl ConfigurationChanged {
    /// Keys touched by this change.
    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(PropertyChange::key)
    }

    /// Whether `key` is among the changed keys.
    pub fn touches(&self, key: &str) -> bool {
        self.changed_keys().any(|k| k == key)
    }
}

/// Wraps an event that was posted while no listener accepted its type.
///
/// Useful for spotting misconfigured wiring; register a listener for
/// `DeadEvent` to see them.
#[derive(Clone)]
pub struct DeadEvent {
    event_type: &'static str,
    event: Arc<dyn Any + Send + Sync>,
}

impl DeadEvent {
    pub(crate) fn new<E: Event>(event: E) -> Self {
        Self {
            event_type: type_name::<E>(),
            event: Arc::new(event),
        }
    }

    /// Type name of the undelivered event.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// Borrow the undelivered event as `E`, if that is its type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.event.downcast_ref::<E>()
    }
}

impl fmt::Debug for DeadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadEvent")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}
