//! Command handlers.

pub mod config_cmd;
pub mod replay;
pub mod static_cmd;

use std::path::PathBuf;

use switchyard_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(switchyard_config::config_path)
}

/// Resolved configuration: defaults, then the file, then the environment.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(switchyard_config::load_from(&config_file(global))?)
}
