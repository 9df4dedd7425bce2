//! Error types for tagmirror-core

use thiserror::Error;

/// Result type alias using tagmirror-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for tagmirror
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid version string
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    /// Invalid tag pattern
    #[error("Invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not lock the state file
    #[error("Failed to lock state file {path}: {source}")]
    StateLock {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Upstream tag enumeration failed
    #[error("Failed to list upstream tags: {0:#}")]
    TagListing(anyhow::Error),

    /// The state store rejected a read or write
    #[error("State store error for tag '{tag}': {source}")]
    StateStore {
        tag: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Wrap a store failure with the tag being processed
    pub fn state_store(tag: impl Into<String>, source: Error) -> Self {
        Self::StateStore {
            tag: tag.into(),
            source: Box::new(source),
        }
    }
}
