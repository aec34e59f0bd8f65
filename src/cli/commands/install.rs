//! Install command - populate a new generation from the manifest

use super::{build_manager, open_store};
use crate::audit::{AuditEvent, AuditLog};
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::generation::GenerationId;
use crate::ui::{self, Progress, UiContext};
use url::Url;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let audit = AuditLog::new(config);

    let manifest = config.load_manifest(args.manifest.as_deref()).await?;
    let generation = match args.generation {
        Some(id) => GenerationId::new(id)?,
        None => config.generation_id(&manifest)?,
    };

    let manager = build_manager(config, generation.clone(), open_store(config))?;
    let progress = Progress::counted(
        &ctx,
        &format!("Installing {}", generation),
        manifest.len(),
    );
    let result = manager
        .install_with_progress(&manifest, &|url: &Url| progress.advance(url.path()))
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            progress.fail(&format!("Could not install {}", generation));
            audit
                .record(AuditEvent::InstallFailed {
                    generation: &generation,
                    reason: e.to_string(),
                })
                .await;
            return Err(e);
        }
    };

    audit
        .record(AuditEvent::Installed {
            generation: &report.generation,
            entries: report.stored.len(),
            bytes: report.bytes,
        })
        .await;

    let verb = if report.created { "Installed" } else { "Refreshed" };
    progress.succeed(
        &format!("{} generation {}", verb, report.generation),
        Some(&format!("{} entries, {} bytes", report.stored.len(), report.bytes)),
    );
    ui::hint(
        &ctx,
        &format!("Run: shellcache activate --generation {}", report.generation),
    );

    Ok(())
}
