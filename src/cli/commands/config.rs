//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{schema::AUTO_GENERATION, Config, ConfigManager};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::generation::GenerationId;
use crate::http::parse_url;
use crate::manifest::ManifestEntry;
use crate::ui::{self, Mark, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const SETTABLE_KEYS: [&str; 10] = [
    "general.log_format",
    "general.audit_log",
    "origin.base_url",
    "origin.timeout_secs",
    "origin.user_agent",
    "cache.generation",
    "cache.generation_prefix",
    "cache.dir",
    "manifest.assets",
    "manifest.file",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> ShellCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            if let Err(e) = set_value(&mut updated, &key, &value) {
                if matches!(e, ShellCacheError::ConfigKey(_)) {
                    eprintln!("Valid keys:");
                    for key in SETTABLE_KEYS {
                        eprintln!("  {}", key);
                    }
                }
                return Err(e);
            }
            manager.save(&updated).await?;
            ui::step(
                &UiContext::detect(),
                Mark::Done,
                &format!("Set {} = {}", key, value),
                None,
            );
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ShellCacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step(
            &ctx,
            Mark::Warn,
            &format!("Config already exists at {}", path.display()),
            Some("use --force to overwrite"),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step(
        &ctx,
        Mark::Done,
        "Configuration initialized",
        Some(&path.display().to_string()),
    );

    Ok(())
}

/// Apply a dot-separated key to `config`, validating the value
fn set_value(config: &mut Config, key: &str, value: &str) -> ShellCacheResult<()> {
    match key {
        "general.log_format" => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(ShellCacheError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },
        "general.audit_log" => config.general.audit_log = parse_bool(value)?,

        "origin.base_url" => {
            parse_url(value)?;
            config.origin.base_url = value.to_string();
        }
        "origin.timeout_secs" => {
            config.origin.timeout_secs = value
                .parse()
                .map_err(|_| ShellCacheError::User(format!("Invalid number: {}", value)))?
        }
        "origin.user_agent" => config.origin.user_agent = value.to_string(),

        "cache.generation" => {
            if value != AUTO_GENERATION {
                GenerationId::new(value)?;
            }
            config.cache.generation = value.to_string();
        }
        "cache.generation_prefix" => {
            // The prefix must itself form a valid identifier
            GenerationId::new(value)?;
            config.cache.generation_prefix = value.to_string();
        }
        "cache.dir" => config.cache.dir = optional_path(value),

        "manifest.assets" => {
            config.manifest.assets = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| ManifestEntry::Path(s.to_string()))
                .collect();
        }
        "manifest.file" => config.manifest.file = optional_path(value),

        _ => return Err(ShellCacheError::ConfigKey(key.to_string())),
    }

    Ok(())
}

/// Empty value unsets the path
fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn parse_bool(value: &str) -> ShellCacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ShellCacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}
