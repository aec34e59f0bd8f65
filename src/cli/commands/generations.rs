//! Generations command - list stored generations

use super::{open_store, resolve_generation};
use crate::cli::args::{GenerationsArgs, OutputFormat};
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, Mark, UiContext};
use console::style;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct GenerationRow {
    id: String,
    /// Named by the store's active pointer
    active: bool,
    /// Matches the configured generation
    current: bool,
    entries: usize,
}

/// Execute the generations command
pub async fn execute(args: GenerationsArgs, config: &Config) -> ShellCacheResult<()> {
    let store = open_store(config);
    let active = store.active().await?;
    let current = match resolve_generation(config, None, None).await {
        Ok(current) => Some(current),
        Err(e) => {
            debug!(error = %e, "No configured generation to mark");
            None
        }
    };

    let mut rows = Vec::new();
    for generation in store.generations().await? {
        let entries = store.entries(&generation).await?.len();
        rows.push(GenerationRow {
            active: active.as_ref() == Some(&generation),
            current: current.as_ref() == Some(&generation),
            id: generation.to_string(),
            entries,
        });
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.id);
            }
        }
        OutputFormat::Table if rows.is_empty() => {
            let ctx = UiContext::detect();
            ui::step(&ctx, Mark::Info, "No generations stored", None);
        }
        OutputFormat::Table => print_table(&rows),
    }

    Ok(())
}

fn print_table(rows: &[GenerationRow]) {
    println!(
        "{:<32} {:<10} {:>8}",
        style("GENERATION").bold(),
        style("STATUS").bold(),
        style("ENTRIES").bold()
    );
    println!("{}", "-".repeat(52));

    for row in rows {
        let status = match (row.active, row.current) {
            (true, _) => style("active").green(),
            (false, true) => style("current").cyan(),
            (false, false) => style("stale").dim(),
        };
        println!("{:<32} {:<10} {:>8}", row.id, status, row.entries);
    }

    println!();
    println!("{} generation(s)", rows.len());
}
