use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::{Commands, ConfigCommands, RunArgs};

/// Top-level CLI parser for the `runway` binary.
#[derive(Debug, Parser)]
#[command(name = "runway", version, about = "Runway - async app lifecycle demo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Extra TOML config file, merged after the default files (repeatable)
    #[arg(short, long = "config", global = true, value_name = "FILE")]
    pub config_files: Vec<PathBuf>,

    /// Override a config key, e.g. `--set heartbeat.interval_ms=500` (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// App name; selects the env prefix and config file locations
    #[arg(long, global = true, default_value = "runway")]
    pub app_name: String,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            app_name: self.app_name.clone(),
            config_files: self.config_files.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, ConfigCommands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from([
            "runway",
            "--format",
            "raw",
            "--config",
            "base.toml",
            "-c",
            "local.toml",
            "--verbose",
            "config",
            "show",
        ])
        .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert_eq!(
            cli.config_files,
            vec![PathBuf::from("base.toml"), PathBuf::from("local.toml")]
        );
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigCommands::Show { raw: false }
            }
        ));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["runway", "config", "check", "--quiet", "--app-name", "svc"])
            .expect("cli should parse");

        assert!(cli.quiet);
        assert_eq!(cli.app_name, "svc");
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigCommands::Check
            }
        ));
    }

    #[test]
    fn run_arguments() {
        let cli = Cli::try_parse_from(["runway", "run", "--duration", "3", "--workers", "4"])
            .expect("cli should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.duration, Some(3));
                assert_eq!(args.workers, Some(4));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        let parsed = Cli::try_parse_from(["runway", "--format", "xml", "config", "schema"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_extraction_copies_values() {
        let cli = Cli::try_parse_from([
            "runway",
            "--set",
            "workers=3",
            "--set",
            "name=demo",
            "config",
            "show",
            "--raw",
        ])
        .expect("cli should parse");
        let flags = cli.global_flags();

        assert_eq!(flags.app_name, "runway");
        assert_eq!(flags.overrides, vec!["workers=3", "name=demo"]);
        assert!(flags.config_files.is_empty());
    }
}
