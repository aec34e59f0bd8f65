//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use crate::manifest::{Manifest, ManifestEntry};
use crate::policy::{BypassPolicy, PolicyRule};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generation value that derives the identifier from the manifest digest
pub const AUTO_GENERATION: &str = "auto";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Origin the application shell is served from
    pub origin: OriginConfig,

    /// Generation store settings
    pub cache: CacheConfig,

    /// Assets pre-fetched at install
    pub manifest: ManifestConfig,

    /// Bypass rules for fetch interception
    pub policy: PolicyConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Origin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Scope URL manifest paths resolve against
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent to the origin
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            timeout_secs: 30,
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Generation store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Current generation identifier, or "auto" to derive it from the manifest
    pub generation: String,

    /// Prefix for derived generation identifiers
    pub generation_prefix: String,

    /// Store directory (default: state dir `generations/`)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: "v1".to_string(),
            generation_prefix: "versys-cache".to_string(),
            dir: None,
        }
    }
}

/// Manifest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Asset paths (or `{ path, integrity }` tables)
    pub assets: Vec<ManifestEntry>,

    /// JSON manifest file; replaces `assets` when set
    pub file: Option<PathBuf>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            assets: ["/", "/index.html", "/manifest.json", "/favicon.ico"]
                .iter()
                .map(|p| ManifestEntry::Path(p.to_string()))
                .collect(),
            file: None,
        }
    }
}

impl ManifestConfig {
    /// Manifest from inline assets
    pub fn inline(&self) -> Manifest {
        Manifest::new(self.assets.clone())
    }
}

/// Bypass policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Ordered rules; first match wins
    pub rules: Vec<PolicyRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rules: BypassPolicy::default().rules,
        }
    }
}

impl PolicyConfig {
    pub fn to_policy(&self) -> BypassPolicy {
        BypassPolicy::new(self.rules.clone())
    }
}
