//! Clap derive structures for the `ferry` CLI.
//!
//! Kept free of workspace crates so `build.rs` can render man pages from it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ferry -- copy and restore platform resources between accounts
#[derive(Debug, Parser)]
#[command(
    name = "ferry",
    version,
    about = "Copy and restore platform resources between accounts",
    long_about = "Copies devices, analyses, dashboards, actions and the rest of an \
        account's resources into another account, or restores them from an \
        extracted backup archive.\n\n\
        Entities that already exist on the target are updated in place; \
        references between entities are rewritten to the target's identifiers.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Output format for the run summary
    #[arg(
        long,
        short = 'o',
        env = "FERRY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress and summary output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy resources from one account into another
    Export(ExportArgs),

    /// Write an extracted backup archive into an account
    Restore(RestoreArgs),

    /// Inspect the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Profile of the account to read from
    #[arg(long)]
    pub from: String,

    /// Profile of the account to write into
    #[arg(long)]
    pub to: String,

    /// Entity kinds to copy, comma separated (default: all)
    #[arg(long, short = 'e', value_delimiter = ',')]
    pub entities: Vec<String>,

    /// Tag key used to match entities across accounts
    #[arg(long)]
    pub tag: Option<String>,

    /// Pause after each item, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Extracted archive directory
    #[arg(long, short = 'a')]
    pub archive: PathBuf,

    /// Profile of the account to restore into
    #[arg(long)]
    pub to: String,

    /// Pause after each item, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the loaded configuration (tokens redacted)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
