//! Error types for tiered-config.

/// Result type alias for tiered-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Boxed error used by listener handlers and custom converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when working with configuration.
///
/// A missing key is never an error: reads return `Option::None` instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A property source failed to enumerate its entries.
    ///
    /// The resolver records this and skips the source; it never reaches
    /// callers of `get` or `get_properties`.
    #[error("Failed to read property source '{source_name}': {reason}")]
    SourceRead {
        /// Name of the failing source
        source_name: String,
        /// Why the read failed
        reason: String,
    },

    /// A configured value could not be converted to the requested type.
    #[error("Cannot convert '{key}' to {target}: {reason}")]
    Conversion {
        /// The property key
        key: String,
        /// Name of the requested type
        target: &'static str,
        /// The converter's error message
        reason: String,
    },

    /// No converter was registered for the requested type.
    #[error("No converter registered for {target} (key '{key}')")]
    ConverterMissing {
        /// The property key
        key: String,
        /// Name of the requested type
        target: &'static str,
    },

    /// Failed to bind the merged view into a typed structure.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Create a source read failure.
    pub fn source_read(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceRead {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
