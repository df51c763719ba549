//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Tidemark using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Exit code for a clean run
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code when the database cannot be reached
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code for any other fatal error
pub const EXIT_FATAL: i32 = 5;

/// Tidemark - resumable change feed consumer
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version, about, long_about = None)]
#[command(author = "Tidemark Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tidemark.toml", env = "TIDEMARK_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TIDEMARK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the configured collections until interrupted
    Run(commands::run::RunArgs),

    /// Show stored resume watermarks
    Status(commands::status::StatusArgs),

    /// Delete a collection's watermark so it restarts from the tail
    Reset(commands::reset::ResetArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["tidemark", "run"]);
        assert_eq!(cli.config, "tidemark.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["tidemark", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["tidemark", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_reset_requires_collection() {
        assert!(Cli::try_parse_from(["tidemark", "reset"]).is_err());

        let cli = Cli::parse_from(["tidemark", "reset", "orders", "--yes"]);
        match cli.command {
            Commands::Reset(args) => {
                assert_eq!(args.collection, "orders");
                assert!(args.yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["tidemark", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["tidemark", "status", "--collection", "orders"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["tidemark", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
