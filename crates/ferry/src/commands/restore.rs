//! `ferry restore`: write an extracted archive into a live account.

use ferry_core::{Archive, SyncMode};

use crate::cli::{GlobalOpts, OutputFormat, RestoreArgs};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::progress::PhaseProgress;

pub async fn handle(args: RestoreArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let archive = Archive::open(&args.archive)?;
    let summary = archive.summary();

    let cfg = config::load_config()?;
    let target = config::client_for(&cfg, &args.to)?;
    let sync = config::sync_config(&cfg, SyncMode::Restore, None, args.delay_ms);

    if global.output == OutputFormat::Table {
        output::print_output(&output::render_archive_summary(&summary), global.quiet);
    }
    if summary.total() == 0 {
        eprintln!("Archive {} holds no entities.", archive.root().display());
        return Ok(());
    }

    util::require_interactive("restore", global.yes)?;
    let prompt = format!(
        "Restore {} entities into profile '{}'?",
        summary.total(),
        args.to
    );
    if !util::confirm(&prompt, global.yes)? {
        eprintln!("Restore cancelled.");
        return Ok(());
    }

    tracing::info!(
        archive = %archive.root().display(),
        to = %args.to,
        entities = summary.total(),
        "starting restore"
    );
    let observer = PhaseProgress::new(global.quiet, false);
    let report =
        ferry_core::restore(&archive, &target, &sync, &observer, util::cancel_on_ctrl_c()).await;

    util::finish(&report, global)
}
