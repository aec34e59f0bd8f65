//! Clear command - remove every stored generation

use super::open_store;
use crate::audit::{AuditEvent, AuditLog};
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, Mark, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let store = open_store(config);
    let generations = store.generations().await?;

    if generations.is_empty() {
        ui::step(&ctx, Mark::Info, "No generations stored", None);
        return Ok(());
    }

    let prompt = format!("Remove {} generation(s)?", generations.len());
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::step(
            &ctx,
            Mark::Warn,
            "Nothing removed",
            Some("pass --yes to skip confirmation"),
        );
        return Ok(());
    }

    let mut removed = Vec::new();
    for generation in generations {
        store.delete(&generation).await?;
        removed.push(generation);
    }

    AuditLog::new(config)
        .record(AuditEvent::Cleared { removed: &removed })
        .await;
    ui::step(
        &ctx,
        Mark::Done,
        &format!("Removed {} generation(s)", removed.len()),
        None,
    );

    Ok(())
}
