//! CLI definitions for the `mailstep` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// mailstep - custom journey activity that sends mail through a delivery API.
#[derive(Parser)]
#[command(name = "mailstep", version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress all output except errors
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the callback server
    Serve {
        /// Path to the TOML config file
        #[arg(long, short, default_value = "mailstep.toml")]
        config: PathBuf,

        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,

        /// Export spans through OpenTelemetry (stdout exporter)
        #[arg(long)]
        otel: bool,
    },

    /// Load the config and perform one token exchange against the mail API
    Check {
        /// Path to the TOML config file
        #[arg(long, short, default_value = "mailstep.toml")]
        config: PathBuf,
    },
}

impl Cli {
    /// Default log directives for the chosen verbosity.
    pub fn log_directives(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,mailstep=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "mailstep", "-v", "serve", "--config", "relay.toml", "--port", "8080", "--otel",
        ])
        .unwrap();
        assert_eq!(cli.log_directives(), "info,mailstep=debug");
        match cli.command {
            Commands::Serve {
                config, port, otel, host,
            } => {
                assert_eq!(config, PathBuf::from("relay.toml"));
                assert_eq!(port, Some(8080));
                assert!(otel);
                assert!(host.is_none());
            }
            Commands::Check { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_check_defaults() {
        let cli = Cli::try_parse_from(["mailstep", "--quiet", "check"]).unwrap();
        assert_eq!(cli.log_directives(), "error");
        match cli.command {
            Commands::Check { config } => assert_eq!(config, PathBuf::from("mailstep.toml")),
            Commands::Serve { .. } => panic!("expected check"),
        }
    }
}
