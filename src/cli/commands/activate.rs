//! Activate command - make a generation current and evict the rest

use super::{build_manager, open_store, resolve_generation};
use crate::audit::{AuditEvent, AuditLog};
use crate::cli::args::ActivateArgs;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::ui::{self, Mark, Progress, UiContext};
use crate::worker::ServiceWorker;

/// Execute the activate command
pub async fn execute(args: ActivateArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let audit = AuditLog::new(config);

    let generation = resolve_generation(config, args.generation.as_deref(), None).await?;
    let manager = build_manager(config, generation.clone(), open_store(config))?;

    let progress = Progress::spinner(&ctx, &format!("Activating generation {}...", generation));
    let report = match manager.on_activate(&generation).await {
        Ok(report) => report,
        Err(e) => {
            progress.fail(&format!("Could not activate {}", generation));
            return Err(e);
        }
    };
    progress.succeed(
        &format!("Activated generation {}", report.retained),
        Some(&format!("{} evicted", report.evicted.len())),
    );

    audit
        .record(AuditEvent::Activated {
            generation: &report.retained,
            evicted: &report.evicted,
        })
        .await;
    for (stale, reason) in &report.failed {
        audit
            .record(AuditEvent::EvictFailed {
                generation: stale,
                reason,
            })
            .await;
        ui::step(&ctx, Mark::Fail, &format!("Could not evict {}", stale), Some(reason));
    }

    if !report.is_complete() {
        return Err(ShellCacheError::EvictionIncomplete(
            report.failed.iter().map(|(g, _)| g.to_string()).collect(),
        ));
    }
    Ok(())
}
