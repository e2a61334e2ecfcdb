use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Run the demo app until a signal arrives or the duration elapses.
    Run(RunArgs),
    /// Inspect and validate configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Number of worker tasks (overrides `workers` from config)
    #[arg(long)]
    pub workers: Option<u64>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration.
    Show {
        /// Print only values provided by a source, without defaults
        #[arg(long)]
        raw: bool,
    },
    /// List every option with its type, default and doc.
    Schema,
    /// Validate the configuration; exits with status 1 when invalid.
    Check,
}
