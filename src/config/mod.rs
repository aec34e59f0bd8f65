//! Configuration management for shellcache

pub mod schema;

pub use schema::Config;

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::generation::GenerationId;
use crate::manifest::Manifest;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// File name of project-local configuration overrides
pub const LOCAL_CONFIG_FILE: &str = ".shellcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellcache")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellcache")
    }

    /// Get the default generation store directory
    pub fn generations_dir() -> PathBuf {
        Self::state_dir().join("generations")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> ShellCacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ShellCacheResult<Config> {
        let value = read_toml(path).await?;
        value.try_into().map_err(|e: toml::de::Error| ShellCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with a local override file merged on top
    ///
    /// Tables merge key by key; any other local value replaces the global one.
    pub async fn load_merged(&self, local: Option<&Path>) -> ShellCacheResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut base = if self.config_path.exists() {
            read_toml(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };
        let overlay = read_toml(local).await?;
        merge_toml(&mut base, overlay);

        base.try_into().map_err(|e: toml::de::Error| ShellCacheError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Walk up from `start` looking for a `.shellcache.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ShellCacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ShellCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> ShellCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShellCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the state directory and store directory exist
    pub async fn ensure_state_dirs(config: &Config) -> ShellCacheResult<()> {
        let dirs = [Self::state_dir(), config.store_dir()];

        for dir in &dirs {
            fs::create_dir_all(dir).await.map_err(|e| {
                ShellCacheError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Scope URL all manifest paths resolve against
    pub fn scope(&self) -> ShellCacheResult<Url> {
        let scope = crate::http::parse_url(&self.origin.base_url)?;
        if scope.cannot_be_a_base() {
            return Err(ShellCacheError::InvalidUrl {
                url: self.origin.base_url.clone(),
                reason: "origin.base_url cannot be used as a base".to_string(),
            });
        }
        Ok(scope)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.origin.timeout_secs)
    }

    /// Generation store directory
    pub fn store_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(ConfigManager::generations_dir)
    }

    /// Manifest from `manifest.file` if set, else from the inline assets
    pub async fn load_manifest(
        &self,
        override_file: Option<&Path>,
    ) -> ShellCacheResult<Manifest> {
        match override_file.or(self.manifest.file.as_deref()) {
            Some(path) => Manifest::load(path).await,
            None => Ok(self.manifest.inline()),
        }
    }

    /// Identifier of the current generation for `manifest`
    pub fn generation_id(&self, manifest: &Manifest) -> ShellCacheResult<GenerationId> {
        if self.cache.generation == schema::AUTO_GENERATION {
            manifest.generation(&self.cache.generation_prefix)
        } else {
            GenerationId::new(self.cache.generation.clone())
        }
    }
}

async fn read_toml(path: &Path) -> ShellCacheResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ShellCacheError::io(format!("reading config from {}", path.display()), e))?;

    content
        .parse()
        .map_err(|e: toml::de::Error| ShellCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
