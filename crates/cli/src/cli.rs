//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DualCam Sync - front/back camera frame synchronization with adaptive quality
#[derive(Parser, Debug)]
#[command(
    name = "dualcam-sync",
    author,
    version,
    about = "Dual-camera frame synchronization pipeline",
    long_about = "Pairs frames from a front and a back camera captured on independent paths.\n\n\
                  Runs both cameras, matches frames within a drift-compensated sync window, \n\
                  watches device resources and adapts capture quality when they degrade."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DUALCAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DUALCAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture and synchronization pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the quality catalog and coordinator settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "DUALCAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds (0 = until Ctrl+C)
    #[arg(short, long, default_value = "0", env = "DUALCAM_DURATION")]
    pub duration: u64,

    /// Stop after this many dispatched pairs (0 = unlimited)
    #[arg(long, default_value = "0", env = "DUALCAM_MAX_PAIRS")]
    pub max_pairs: u64,

    /// Seed for the mock cameras' jitter and drop generators
    #[arg(long, env = "DUALCAM_SEED")]
    pub seed: Option<u64>,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DUALCAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dualcam.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-level constraints
    #[arg(long)]
    pub constraints: bool,

    /// Show sink configuration (log, debug journal, network)
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["dualcam-sync", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.config.is_none());
        assert_eq!(args.duration, 0);
        assert_eq!(args.metrics_port, 0);
        assert!(!args.dry_run);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dualcam-sync", "-q", "-v", "info"]).is_err());
    }
}
