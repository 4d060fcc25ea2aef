//! Terminal output for the CLI
//!
//! Uses `cliclack` when attached to a terminal and falls back to plain,
//! tagged lines (`[OK]`, `[WARN]`) in CI or when output is piped.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{intro, key_value, outro_success, outro_warn, remark, step_info, step_ok, step_warn};
pub use progress::TaskSpinner;
pub use prompts::confirm;
