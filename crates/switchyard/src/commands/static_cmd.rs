//! Static topology subcommand handlers.

use switchyard_config::Config;
use switchyard_core::StaticTopologyPersister;

use crate::cli::{GlobalOpts, StaticArgs, StaticCommand};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &StaticArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let store = config.static_topology_store();
    match args.command {
        StaticCommand::Show => {
            let topology = store.load()?;
            output::print_output(&output::render(&global.output, &topology)?, global.quiet);
        }
        StaticCommand::Path => {
            output::print_output(&store.dir().display().to_string(), global.quiet);
        }
    }
    Ok(())
}
