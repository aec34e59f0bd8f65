//! Line printers for command results
//!
//! Commands report outcomes as [`step`] lines and facts as [`Panel`] fields.
//! On a terminal both go through cliclack; otherwise they print as plain
//! tagged lines that scripts can match on.

use super::context::UiContext;
use console::style;
use std::fmt::Display;
use tracing::debug;

/// Width of the key column in a [`Panel`]
const KEY_WIDTH: usize = 14;

/// Outcome tag of a step line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Done,
    Warn,
    Fail,
    Info,
}

impl Mark {
    fn tag(self) -> String {
        let tag = match self {
            Mark::Done => style("[OK]").green(),
            Mark::Warn => style("[WARN]").yellow(),
            Mark::Fail => style("[FAIL]").red(),
            Mark::Info => style("[INFO]").cyan(),
        };
        tag.to_string()
    }
}

/// Print one step line with an optional trailing detail
pub fn step(ctx: &UiContext, mark: Mark, message: &str, detail: Option<&str>) {
    if !ctx.use_fancy_output() {
        match detail {
            Some(detail) => println!("  {} {} ({})", mark.tag(), message, detail),
            None => println!("  {} {}", mark.tag(), message),
        }
        return;
    }

    let line = match detail {
        Some(detail) => format!("{} {}", message, style(format!("({})", detail)).dim()),
        None => message.to_string(),
    };
    let written = match mark {
        Mark::Done => cliclack::log::success(line),
        Mark::Warn => cliclack::log::warning(line),
        Mark::Fail => cliclack::log::error(line),
        Mark::Info => cliclack::log::info(line),
    };
    if let Err(e) = written {
        debug!(error = %e, "Terminal write failed");
    }
}

/// Dimmed follow-up suggestion, e.g. the next command to run
pub fn hint(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        if let Err(e) = cliclack::log::remark(message) {
            debug!(error = %e, "Terminal write failed");
        }
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Titled block of aligned key/value fields
pub struct Panel<'a> {
    ctx: &'a UiContext,
}

impl<'a> Panel<'a> {
    pub fn open(ctx: &'a UiContext, title: &str) -> Self {
        println!();
        println!("{}", style(title).bold());
        Self { ctx }
    }

    pub fn field(&self, key: &str, value: impl Display) {
        println!("  {} {}", Self::key(key), value);
    }

    /// Field whose value is colored by health; unhealthy ones carry a tag
    /// when colors are off
    pub fn flagged(&self, key: &str, value: impl Display, healthy: bool) {
        if self.ctx.use_fancy_output() {
            let value = if healthy {
                style(value.to_string()).green()
            } else {
                style(value.to_string()).yellow()
            };
            println!("  {} {}", Self::key(key), value);
        } else if healthy {
            println!("  {} {}", Self::key(key), value);
        } else {
            println!("  {} {} {}", Self::key(key), value, Mark::Warn.tag());
        }
    }

    pub fn hint(&self, message: &str) {
        hint(self.ctx, message);
    }

    fn key(key: &str) -> String {
        let padded = format!("{:<width$}", format!("{}:", key), width = KEY_WIDTH);
        style(padded).dim().to_string()
    }
}
