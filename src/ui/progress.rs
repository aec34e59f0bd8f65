//! Progress for long-running commands
//!
//! A single [`Progress`] covers a counted bar (install entries) and an
//! open-ended spinner (activation). Off a terminal it prints a start line,
//! one line per item and the closing step.

use super::context::UiContext;
use super::output::{step, Mark};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(120);

pub struct Progress {
    ctx: UiContext,
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Bar over `total` items
    pub fn counted(ctx: &UiContext, label: &str, total: usize) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━╸─"),
            );
            bar.set_prefix(label.to_string());
            bar
        });
        Self::start(ctx, bar, &format!("{} ({} entries)", label, total))
    }

    /// Spinner with no known length
    pub fn spinner(ctx: &UiContext, label: &str) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(label.to_string());
            bar
        });
        Self::start(ctx, bar, label)
    }

    fn start(ctx: &UiContext, bar: Option<ProgressBar>, label: &str) -> Self {
        match bar {
            Some(ref bar) => bar.enable_steady_tick(TICK),
            None => println!("{} {}", style("...").dim(), label),
        }
        Self {
            ctx: ctx.clone(),
            bar,
        }
    }

    /// One item done
    pub fn advance(&self, item: &str) {
        match self.bar {
            Some(ref bar) => {
                bar.inc(1);
                bar.set_message(item.to_string());
            }
            None => println!("  stored {}", item),
        }
    }

    pub fn succeed(self, message: &str, detail: Option<&str>) {
        self.clear();
        step(&self.ctx, Mark::Done, message, detail);
    }

    pub fn fail(self, message: &str) {
        self.clear();
        step(&self.ctx, Mark::Fail, message, None);
    }

    fn clear(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
