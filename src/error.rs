use thiserror::Error;

use crate::config::Lifecycle;

/// Error type returned by pluggable pieces: sources, formatters and build functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by [`ConfigBuilder`](crate::ConfigBuilder).
///
/// Every failure inside a build is reported as exactly one of these variants.
/// The error that caused it, if any, is reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config builder requires at least one source")]
    NoSources,

    #[error("build function failed: {0}")]
    BuildFunction(#[source] BoxError),

    #[error("{lifecycle} listener failed: {source}")]
    Lifecycle {
        lifecycle: Lifecycle,
        #[source]
        source: BoxError,
    },

    #[error("config source error for key \"{key}\" in source \"{source_name}\" at index {source_index}: {source}")]
    ResolveValue {
        key: String,
        source_index: usize,
        source_name: String,
        #[source]
        source: BoxError,
    },

    #[error("formatter failed for key \"{key}\": {source}")]
    Formatter {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("missing required configuration keys: \"{}\"", keys.join(", "))]
    MissingRequiredKeys { keys: Vec<String> },

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl ConfigError {
    /// Returns the lifecycle phase for [`ConfigError::Lifecycle`] errors.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        match self {
            ConfigError::Lifecycle { lifecycle, .. } => Some(*lifecycle),
            _ => None,
        }
    }

    /// Returns the unresolved keys for [`ConfigError::MissingRequiredKeys`] errors.
    pub fn missing_keys(&self) -> Option<&[String]> {
        match self {
            ConfigError::MissingRequiredKeys { keys } => Some(keys),
            _ => None,
        }
    }
}
