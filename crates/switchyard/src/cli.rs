//! Clap derive structures for the `switchyard` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// switchyard -- drive the inventory and topology engine from a scenario file
#[derive(Debug, Parser)]
#[command(
    name = "switchyard",
    version,
    about = "Converge SDN inventory and topology from discovery notifications",
    long_about = "Replays recorded discovery notifications through an in-process\n\
        inventory engine and prints the published events and the converged\n\
        topology.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SWITCHYARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SWITCHYARD_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a scenario file through a fresh engine
    Replay(ReplayArgs),

    /// Inspect the persisted static topology
    #[command(name = "static")]
    Static(StaticArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Start as a non-owner instance (converges without publishing)
    #[arg(long)]
    pub observer: bool,

    /// Read and write the configured static topology files
    #[arg(long)]
    pub persist: bool,

    /// Print only the published events
    #[arg(long, conflicts_with = "topology_only")]
    pub events_only: bool,

    /// Print only the converged topology
    #[arg(long)]
    pub topology_only: bool,
}

#[derive(Debug, Args)]
pub struct StaticArgs {
    #[command(subcommand)]
    pub command: StaticCommand,
}

#[derive(Debug, Subcommand)]
pub enum StaticCommand {
    /// Show the switch links and edge ports on disk
    Show,

    /// Print the directory holding the static topology files
    Path,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}
