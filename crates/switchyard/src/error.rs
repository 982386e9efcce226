//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use switchyard_config::ConfigError;
use switchyard_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const ENGINE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Scenario ─────────────────────────────────────────────────────

    #[error("Could not read scenario {path}")]
    #[diagnostic(code(switchyard::scenario_unreadable))]
    ScenarioUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario {path}: {reason}")]
    #[diagnostic(
        code(switchyard::scenario_invalid),
        help("A scenario is a JSON object with a \"steps\" array; see the README.")
    )]
    ScenarioInvalid { path: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(switchyard::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(switchyard::config))]
    Config(#[from] ConfigError),

    // ── Engine ───────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(switchyard::engine))]
    Engine(#[from] CoreError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(switchyard::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render config: {0}")]
    #[diagnostic(code(switchyard::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ScenarioInvalid { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            Self::Config(_) => exit_code::CONFIG,
            Self::Engine(_) => exit_code::ENGINE,
            _ => exit_code::GENERAL,
        }
    }
}
