//! Shared helpers for command handlers.

use std::io::{self, IsTerminal};
use std::str::FromStr;

use ferry_core::{CancellationToken, EntityKind, RunReport};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(io::Error::other(e)))?;
    Ok(confirmed)
}

/// Fail early when a prompt would be needed but nobody can answer it.
pub fn require_interactive(action: &str, yes_flag: bool) -> Result<(), CliError> {
    if yes_flag || io::stdin().is_terminal() {
        return Ok(());
    }
    Err(CliError::NonInteractiveRequiresYes {
        action: action.into(),
    })
}

/// Parse `--entities`; an empty list selects every kind.
pub fn parse_kinds(names: &[String]) -> Result<Vec<EntityKind>, CliError> {
    if names.is_empty() {
        return Ok(EntityKind::all());
    }
    names
        .iter()
        .map(|name| {
            EntityKind::from_str(name.trim()).map_err(|_| CliError::Validation {
                field: "entities".into(),
                reason: format!(
                    "unknown kind '{name}' (expected one of: {})",
                    EntityKind::all()
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
        })
        .collect()
}

/// Cancellation handle fired by the first Ctrl-C; a second one exits.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let fired = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupt received, stopping after the current phase");
        fired.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    token
}

/// Print the run summary and turn failed phases into an error.
pub fn finish(report: &RunReport, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = output::render_report(global.output, report)?;
    output::print_output(&rendered, global.quiet);

    let failed = report.phases.iter().filter(|p| p.is_failure()).count();
    if failed > 0 {
        return Err(CliError::PhaseFailed { failed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_means_every_kind() {
        let kinds = parse_kinds(&[]).unwrap_or_default();
        assert_eq!(kinds.len(), EntityKind::all().len());
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        let kinds = parse_kinds(&["Devices".into(), " run_users".into()]).unwrap_or_default();
        assert_eq!(kinds, vec![EntityKind::Devices, EntityKind::RunUsers]);
    }

    #[test]
    fn unknown_kind_lists_valid_names() {
        let Err(CliError::Validation { reason, .. }) = parse_kinds(&["gadgets".into()]) else {
            panic!("expected a validation error");
        };
        assert!(reason.contains("gadgets"));
        assert!(reason.contains("dashboards"));
    }
}
