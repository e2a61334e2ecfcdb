use runway_config::{ConfigLoader, RuntimeConfig};

use crate::cli::{Commands, GlobalFlags};

pub mod config;
pub mod run;

/// Route a parsed command to its handler.
pub fn dispatch(
    command: Commands,
    flags: &GlobalFlags,
    loader: &ConfigLoader,
    runtime: RuntimeConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run::handle(&args, flags, loader, runtime),
        Commands::Config { action } => config::handle(&action, flags, loader),
    }
}
