//! Confirmation prompt with non-interactive fallback

use super::context::UiContext;
use crate::error::{ShellError, ShellResult};

/// Ask for confirmation; auto-yes answers true, non-interactive answers `default`
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ShellResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || cliclack::confirm(&message).initial_value(default).interact())
        .await
        .map_err(|e| ShellError::Internal(format!("prompt task failed: {}", e)))?
        .map_err(|e| ShellError::User(format!("Prompt failed: {}", e)))
}
