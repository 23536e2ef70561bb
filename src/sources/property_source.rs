//! Property source trait.

use crate::error::Result;
use std::collections::BTreeMap;

/// Entry key that, when present with an integer value, overrides the
/// ordinal a source reports through [`PropertySource::ordinal`].
pub const ORDINAL_KEY: &str = "config.ordinal";

/// Trait for property sources.
///
/// Implement this trait to feed key/value pairs from anywhere (remote APIs,
/// databases, key-value stores) into the resolver. How a source obtains its
/// data is entirely up to the implementation.
pub trait PropertySource: Send + Sync {
    /// Get a human-readable name for this source (used for origin tracking).
    fn name(&self) -> String;

    /// Get the ordinal of this source (higher = takes precedence).
    ///
    /// Default ordinals of the bundled sources:
    /// - Environment variables: 300
    /// - Files: 100
    /// - In-memory maps: 0
    fn ordinal(&self) -> i32 {
        0
    }

    /// Enumerate the current entries of this source.
    ///
    /// Each call returns an independent snapshot; the resolver never holds on
    /// to source state between merges.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read. The resolver skips the
    /// source and records the failure.
    fn entries(&self) -> Result<BTreeMap<String, String>>;
}
