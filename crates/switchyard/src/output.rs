//! Output rendering. Everything the CLI prints to stdout is JSON.

use std::io::{self, Write};

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render<T: serde::Serialize>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
    };
    Ok(rendered)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    // A closed pipe (e.g. `| head`) is not an error worth reporting.
    let _ = writeln!(stdout, "{output}");
}
