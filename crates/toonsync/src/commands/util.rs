//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use toonsync_core::{Notification, NotificationKind};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file(path: &Path) -> Result<serde_json::Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Print queued success/info notices to stderr. Warnings and errors reach
/// the user through the returned `CliError` instead.
pub fn flush_notices(rx: &mut broadcast::Receiver<Arc<Notification>>, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    while let Ok(notice) = rx.try_recv() {
        let shown = matches!(
            notice.kind,
            NotificationKind::Success | NotificationKind::Info
        );
        if shown && !global.quiet {
            eprintln!("{}", output::format_notice(&notice, color));
        }
    }
}
