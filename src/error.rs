//! Error types for shellcache
//!
//! All modules use `ShellCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellCacheResult<T> = Result<T, ShellCacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellCacheError {
    // Lifecycle errors
    #[error("Install failed for {url}: {reason}")]
    Population { url: String, reason: String },

    #[error("Generation {0} is not installed")]
    GenerationNotInstalled(String),

    #[error("Invalid generation identifier '{id}': {reason}")]
    InvalidGeneration { id: String, reason: String },

    #[error("Cannot move worker from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Failed to evict {} stale generation(s): {}", .0.len(), .0.join(", "))]
    EvictionIncomplete(Vec<String>),

    // Manifest errors
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    // Request errors
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    // Storage errors
    #[error("Cache lookup failed: {0}")]
    Lookup(String),

    #[error("Corrupt cache entry at {path}: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Cache storage error: {context}")]
    StoreIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Unknown configuration key: {0}")]
    ConfigKey(String),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a storage IO error with context
    pub fn store_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StoreIo {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a population (install) error for a URL
    pub fn population(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Population {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the storage layer
    ///
    /// Fetch interception recovers from these by going to the network.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Lookup(_) | Self::StoreCorrupt { .. } | Self::StoreIo { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Population { .. } => {
                Some("Check that every manifest path exists in the current build output")
            }
            Self::GenerationNotInstalled(_) => Some("Run: shellcache install"),
            Self::EvictionIncomplete(_) => Some("Re-run: shellcache activate"),
            Self::ConfigKey(_) => Some("Run: shellcache config show"),
            _ => None,
        }
    }
}
