//! Read-time value filters and typed converters.
//!
//! Filters and converters run when a value is read, never during a merge, so
//! the snapshot always keeps the raw winning value and its origin.

use crate::error::BoxError;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Rewrites a property value at read time.
///
/// Returning `None` hides the key from readers, exactly as if no source had
/// defined it.
///
/// # Examples
///
/// ```rust
/// use tiered_config::core::PropertyFilter;
///
/// struct Trim;
///
/// impl PropertyFilter for Trim {
///     fn filter(&self, _key: &str, value: &str) -> Option<String> {
///         Some(value.trim().to_string())
///     }
/// }
/// ```
pub trait PropertyFilter: Send + Sync {
    /// Filter the value of `key`.
    fn filter(&self, key: &str, value: &str) -> Option<String>;
}

impl<F> PropertyFilter for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn filter(&self, key: &str, value: &str) -> Option<String> {
        self(key, value)
    }
}

/// Converter from a filtered string value to `T`.
pub(crate) type ConverterFn<T> = Arc<dyn Fn(&str) -> Result<T, BoxError> + Send + Sync>;

/// Ordered filters plus converters keyed by target type.
#[derive(Clone)]
pub struct ValuePipeline {
    filters: Vec<Arc<dyn PropertyFilter>>,
    converters: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ValuePipeline {
    /// Create a pipeline with no filters and the built-in `Duration` converter.
    pub fn new() -> Self {
        let mut pipeline = Self {
            filters: Vec::new(),
            converters: HashMap::new(),
        };
        pipeline.add_converter::<Duration, _>(parse_duration);
        pipeline
    }

    /// Append a filter; filters run in the order they were added.
    pub fn add_filter<F: PropertyFilter + 'static>(&mut self, filter: F) {
        self.filters.push(Arc::new(filter));
    }

    /// Register (or replace) the converter for `T`.
    pub fn add_converter<T, F>(&mut self, converter: F)
    where
        T: 'static,
        F: Fn(&str) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let converter: ConverterFn<T> = Arc::new(converter);
        self.converters.insert(TypeId::of::<T>(), Arc::new(converter));
    }

    /// Run all filters over a raw value.
    pub fn apply(&self, key: &str, raw: &str) -> Option<String> {
        let mut value = raw.to_string();
        for filter in &self.filters {
            value = filter.filter(key, &value)?;
        }
        Some(value)
    }

    /// Look up the converter registered for `T`.
    pub(crate) fn converter<T: 'static>(&self) -> Option<ConverterFn<T>> {
        self.converters
            .get(&TypeId::of::<T>())
            .and_then(|c| c.downcast_ref::<ConverterFn<T>>())
            .cloned()
    }

    /// Whether a converter is registered for `T`.
    pub fn has_converter<T: 'static>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<T>())
    }
}

impl Default for ValuePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValuePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuePipeline")
            .field("filters", &self.filters.len())
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Parse a duration such as `250ms`, `10s`, `5m` or `1h`.
///
/// A bare integer is read as milliseconds.
pub fn parse_duration(raw: &str) -> Result<Duration, BoxError> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    if digits.is_empty() {
        return Err(format!("invalid {}: '{}'", type_name::<Duration>(), raw).into());
    }
    let amount: u64 = digits.parse()?;

    let duration = match unit.trim() {
        "" | "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit '{}'", other).into()),
    };
    Ok(duration)
}
