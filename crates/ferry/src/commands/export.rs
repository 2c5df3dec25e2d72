//! `ferry export`: copy resources between two live accounts.

use ferry_core::SyncMode;

use crate::cli::{ExportArgs, GlobalOpts};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::progress::PhaseProgress;

pub async fn handle(args: ExportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.from == args.to {
        return Err(CliError::Validation {
            field: "to".into(),
            reason: format!("source and target are both '{}'", args.from),
        });
    }
    let kinds = util::parse_kinds(&args.entities)?;

    let cfg = config::load_config()?;
    let source = config::client_for(&cfg, &args.from)?;
    let target = config::client_for(&cfg, &args.to)?;
    let sync = config::sync_config(&cfg, SyncMode::Export, args.tag.as_deref(), args.delay_ms);

    util::require_interactive("export", global.yes)?;

    tracing::info!(
        from = %args.from,
        to = %args.to,
        kinds = kinds.len(),
        tag = %sync.tag_name,
        "starting export"
    );
    let observer = PhaseProgress::new(global.quiet, !global.yes);
    let report = ferry_core::export(
        &source,
        &target,
        &kinds,
        &sync,
        &observer,
        util::cancel_on_ctrl_c(),
    )
    .await;

    util::finish(&report, global)
}
