//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "<redacted>";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = config::load_config()?;
            for profile in cfg.profiles.values_mut() {
                if profile.token.is_some() {
                    profile.token = Some(REDACTED.into());
                }
            }
            if cfg.profiles.is_empty() {
                eprintln!(
                    "No profiles configured. Add one under [profiles.<name>] in {}",
                    config::config_path().display()
                );
            }
            let rendered = output::render_value(global.output, &cfg)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
