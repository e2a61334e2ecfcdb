use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod cli;
mod commands;
mod demo;
mod output;

fn main() {
    if let Err(error) = run() {
        eprintln!("runway error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let flags = cli.global_flags();

    let loader = bootstrap::loader(&flags)?;
    let runtime = loader
        .runtime()
        .context("failed to load [runtime] configuration")?;
    init_tracing(flags.quiet, flags.verbose, &runtime.log_filter)?;

    commands::dispatch(cli.command, &flags, &loader, runtime)
}

fn init_tracing(quiet: bool, verbose: bool, configured: &str) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_env("RUNWAY_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
