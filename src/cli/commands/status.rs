//! Status command - show configuration, store and active generation

use super::{open_store, resolve_generation};
use crate::audit::AuditLog;
use crate::config::{Config, ConfigManager};
use crate::error::ShellCacheResult;
use crate::ui::{Panel, UiContext};

/// Execute the status command
pub async fn execute(config: &Config, manager: &ConfigManager) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();

    let settings = Panel::open(&ctx, "Configuration");
    settings.field("Config file", manager.path().display());
    settings.field("Origin", &config.origin.base_url);
    match resolve_generation(config, None, None).await {
        Ok(generation) => settings.field("Generation", generation),
        Err(e) => settings.flagged("Generation", e, false),
    }
    match config.load_manifest(None).await {
        Ok(manifest) => settings.field("Manifest", format!("{} entries", manifest.len())),
        Err(e) => settings.flagged("Manifest", e, false),
    }
    settings.field("Bypass rules", config.policy.rules.len());

    let store = open_store(config);
    let stored = Panel::open(&ctx, "Store");
    stored.field(
        "Location",
        format!("{} ({})", config.store_dir().display(), store.backend_name()),
    );
    stored.field("Generations", store.generations().await?.len());

    match store.active().await? {
        Some(active) => {
            let entries = store.entries(&active).await?.len();
            stored.flagged("Active", format!("{} ({} entries)", active, entries), true);
        }
        None => {
            stored.flagged("Active", "none", false);
            stored.hint("Run: shellcache install && shellcache activate");
        }
    }

    if let Some(entry) = AuditLog::new(config).last_entry().await {
        let last = Panel::open(&ctx, "Last event");
        last.field("Event", entry["event"].as_str().unwrap_or("unknown"));
        last.field("At", entry["timestamp"].as_str().unwrap_or("unknown"));
    }

    Ok(())
}
