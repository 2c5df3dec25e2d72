//! Output formatting: run summaries and archive previews as tables or JSON.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use ferry_core::{ArchiveSummary, PhaseOutcome, PhaseReport, RunReport};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Color only on an interactive stdout with `NO_COLOR` unset.
fn should_color() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Pass")]
    mode: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Entities")]
    count: usize,
}

fn status_label(outcome: &PhaseOutcome, color: bool) -> String {
    let (label, failed) = match outcome {
        PhaseOutcome::Completed(r) if r.failed > 0 => ("completed*".to_owned(), false),
        PhaseOutcome::Completed(_) => ("completed".to_owned(), false),
        PhaseOutcome::Aborted { .. } => ("aborted".to_owned(), true),
        PhaseOutcome::Blocked { by } => (format!("blocked by {by}"), true),
        PhaseOutcome::Skipped => ("skipped".to_owned(), false),
    };
    match (color, failed) {
        (true, true) => label.red().to_string(),
        (true, false) if matches!(outcome, PhaseOutcome::Skipped) => label.dimmed().to_string(),
        (true, false) => label.green().to_string(),
        (false, _) => label,
    }
}

fn phase_row(phase: &PhaseReport, color: bool) -> PhaseRow {
    let tally = phase.result().cloned().unwrap_or_default();
    PhaseRow {
        kind: phase.kind.to_string(),
        mode: phase.mode.to_string(),
        status: status_label(&phase.outcome, color),
        created: tally.created,
        updated: tally.updated,
        failed: tally.failed,
    }
}

// ── Renderers ────────────────────────────────────────────────────────

/// Render the end-of-run summary.
pub fn render_report(format: OutputFormat, report: &RunReport) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(report),
        OutputFormat::Table => Ok(render_report_table(report, should_color())),
    }
}

fn render_report_table(report: &RunReport, color: bool) -> String {
    let rows: Vec<PhaseRow> = report.phases.iter().map(|p| phase_row(p, color)).collect();
    let mut out = Table::new(rows).with(Style::rounded()).to_string();

    let failures: Vec<FailureRow> = report
        .phases
        .iter()
        .filter_map(|p| p.result().map(|r| (p.kind, r)))
        .flat_map(|(kind, r)| {
            r.failures.iter().map(move |f| FailureRow {
                kind: kind.to_string(),
                item: f.name.clone(),
                error: f.error.clone(),
            })
        })
        .collect();
    if !failures.is_empty() {
        out.push_str("\n\nFailed items:\n");
        out.push_str(&Table::new(failures).with(Style::rounded()).to_string());
    }

    for phase in &report.phases {
        if let PhaseOutcome::Aborted { error } = &phase.outcome {
            out.push_str(&format!("\n{} listing failed: {error}", phase.kind));
        }
    }

    let totals = report.totals();
    out.push_str(&format!(
        "\n\n{} created, {} updated, {} failed",
        totals.created, totals.updated, totals.failed
    ));
    if report.cancelled {
        out.push_str(" (cancelled)");
    }
    out
}

/// Render the pre-flight preview of an archive.
pub fn render_archive_summary(summary: &ArchiveSummary) -> String {
    let rows: Vec<CountRow> = summary
        .counts
        .iter()
        .map(|(kind, count)| CountRow {
            kind: kind.to_string(),
            count: *count,
        })
        .collect();
    let mut out = Table::new(rows).with(Style::rounded()).to_string();
    out.push_str(&format!(
        "\n{} entities, {} analysis scripts",
        summary.total(),
        summary.scripts
    ));
    out
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

/// Render a serializable value: TOML for the table format, else JSON.
pub fn render_value<T: serde::Serialize>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(data),
        OutputFormat::Table => {
            toml::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
        }
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
mod tests {
    use ferry_core::{EntityKind, PhaseMode, SyncResult};

    use super::*;

    fn completed(kind: EntityKind, created: usize, failed: usize) -> PhaseReport {
        let mut tally = SyncResult::default();
        for _ in 0..created {
            tally.record_created();
        }
        for i in 0..failed {
            tally.record_failure(format!("item-{i}"), "boom");
        }
        PhaseReport {
            kind,
            mode: PhaseMode::Full,
            outcome: PhaseOutcome::Completed(tally),
        }
    }

    #[test]
    fn table_lists_phases_failures_and_totals() {
        let report = RunReport {
            phases: vec![
                completed(EntityKind::Devices, 2, 1),
                PhaseReport {
                    kind: EntityKind::Dashboards,
                    mode: PhaseMode::Full,
                    outcome: PhaseOutcome::Blocked {
                        by: EntityKind::Analysis,
                    },
                },
            ],
            cancelled: false,
        };
        let out = render_report_table(&report, false);
        assert!(out.contains("devices"));
        assert!(out.contains("blocked by analysis"));
        assert!(out.contains("item-0"));
        assert!(out.contains("2 created, 0 updated, 1 failed"));
    }

    #[test]
    fn json_report_tags_outcomes() {
        let report = RunReport {
            phases: vec![completed(EntityKind::Secrets, 1, 0)],
            cancelled: true,
        };
        let out = render_report(OutputFormat::Json, &report).unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(parsed["phases"][0]["outcome"]["status"], "completed");
        assert_eq!(parsed["phases"][0]["kind"], "secrets");
        assert_eq!(parsed["cancelled"], true);
    }
}
