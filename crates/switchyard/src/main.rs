mod cli;
mod commands;
mod error;
mod output;
mod scenario;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::load_config(&cli.global)?;

    match cli.command {
        Command::Config(args) => commands::config_cmd::handle(args, &config, &cli.global),
        Command::Static(args) => commands::static_cmd::handle(&args, &config, &cli.global),
        Command::Replay(args) => {
            tracing::debug!(scenario = %args.scenario.display(), "replaying scenario");
            commands::replay::handle(&args, &config, &cli.global).await
        }
    }
}
