//! Cargo-style progress output for a sync run.
//!
//! ```text
//!   Correlating devices (identity only)
//!     Copying [=========>               ] 12/30 analysis
//!      Copied analysis: 10 created, 20 updated, 0 failed
//! ```

use std::cell::RefCell;
use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use ferry_core::{EntityKind, PhaseMode, PhaseOutcome, PhaseReport, SyncObserver, SyncResult};

use crate::commands::util;

/// Print a right-aligned status verb and a message to stderr.
fn print_status(status: &str, message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{:>12} {message}", status.green().bold());
    } else {
        eprintln!("{status:>12} {message}");
    }
}

fn tally_message(tally: &SyncResult) -> String {
    format!(
        "{} created, {} updated, {} failed",
        tally.created, tally.updated, tally.failed
    )
}

/// Progress bars per phase, plus the optional per-phase prompt.
pub struct PhaseProgress {
    quiet: bool,
    ask_each_phase: bool,
    bar: RefCell<Option<ProgressBar>>,
}

impl PhaseProgress {
    pub fn new(quiet: bool, ask_each_phase: bool) -> Self {
        Self {
            quiet,
            ask_each_phase,
            bar: RefCell::new(None),
        }
    }

    fn new_bar(&self, kind: EntityKind, total: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:>10} [{bar:25.cyan/dim}] {pos}/{len} {msg:.dim}")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_prefix("Copying");
        bar.set_message(kind.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl SyncObserver for PhaseProgress {
    fn before_phase(&self, kind: EntityKind) -> bool {
        if !self.ask_each_phase {
            return true;
        }
        match util::confirm(&format!("Copy {kind}?"), false) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "prompt failed, skipping phase");
                false
            }
        }
    }

    fn phase_started(&self, kind: EntityKind, mode: PhaseMode, total: usize) {
        if mode == PhaseMode::IdentityOnly {
            if !self.quiet {
                print_status("Correlating", &format!("{kind} (identity only)"));
            }
            return;
        }
        *self.bar.borrow_mut() = Some(self.new_bar(kind, total));
    }

    fn item_settled(&self, kind: EntityKind, tally: &SyncResult, _total: usize) {
        if let Some(bar) = self.bar.borrow().as_ref() {
            bar.set_position(u64::try_from(tally.settled()).unwrap_or(u64::MAX));
            bar.set_message(format!("{kind}: {}", tally_message(tally)));
        }
    }

    fn phase_finished(&self, report: &PhaseReport) {
        if let Some(bar) = self.bar.borrow_mut().take() {
            bar.finish_and_clear();
        }
        if self.quiet || report.mode == PhaseMode::IdentityOnly {
            return;
        }
        match &report.outcome {
            PhaseOutcome::Completed(tally) => {
                print_status("Copied", &format!("{}: {}", report.kind, tally_message(tally)));
            }
            PhaseOutcome::Aborted { error } => {
                print_status("Aborted", &format!("{}: {error}", report.kind));
            }
            PhaseOutcome::Blocked { by } => {
                print_status("Blocked", &format!("{} (needs {by})", report.kind));
            }
            PhaseOutcome::Skipped => print_status("Skipped", &report.kind.to_string()),
        }
    }
}
