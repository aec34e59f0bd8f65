//! Terminal output for the shellcache CLI
//!
//! Uses `cliclack` for styled output and prompts on a terminal, falling back
//! to plain `[OK]`/`[WARN]` lines in CI and when piped.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{hint, step, Mark, Panel};
pub use progress::Progress;
pub use prompts::confirm;
