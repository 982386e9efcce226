//! Config subcommand handlers.

use switchyard_config::{Config, save_config_to};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::config_file(global);
    match args.command {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        ConfigCommand::Show => {
            // Validate before showing so a bad value fails here too.
            config.engine_config()?;
            output::print_output(toml::to_string_pretty(config)?.trim_end(), global.quiet);
        }
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
        }
    }
    Ok(())
}
