//! CLI command implementations

pub mod activate;
pub mod check;
pub mod clear;
pub mod config;
pub mod fetch;
pub mod generations;
pub mod install;
pub mod status;

pub use activate::execute as activate;
pub use check::execute as check;
pub use clear::execute as clear;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use generations::execute as generations;
pub use install::execute as install;
pub use status::execute as status;

use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::generation::GenerationId;
use crate::network::HttpNetwork;
use crate::store::{CacheStore, FileStore};
use crate::worker::OfflineCacheManager;
use std::path::Path;
use std::sync::Arc;

/// Store rooted at the configured directory
fn open_store(config: &Config) -> Arc<dyn CacheStore> {
    Arc::new(FileStore::new(config.store_dir()))
}

/// Explicit identifier if given, else the configured (or derived) one
async fn resolve_generation(
    config: &Config,
    explicit: Option<&str>,
    manifest_file: Option<&Path>,
) -> ShellCacheResult<GenerationId> {
    match explicit {
        Some(id) => GenerationId::new(id),
        None => config.generation_id(&config.load_manifest(manifest_file).await?),
    }
}

/// Worker for `generation` over the configured origin
fn build_manager(
    config: &Config,
    generation: GenerationId,
    store: Arc<dyn CacheStore>,
) -> ShellCacheResult<OfflineCacheManager> {
    let network = HttpNetwork::new(config.timeout(), config.origin.user_agent.clone());
    Ok(OfflineCacheManager::new(
        generation,
        config.scope()?,
        config.policy.to_policy(),
        store,
        Arc::new(network),
    ))
}
