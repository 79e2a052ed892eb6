//! Command-line interface for vahanguard.
//!
//! This module provides the CLI structure for the `vguard` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    resolve_vehicle, AccountCommand, AddVehicleArgs, CategoryArg, ConfigCommand, CreateRequestArgs,
    OutputFormat, RequestCommand, StatusCommand, VehicleCommand,
};

use crate::logging::Verbosity;

/// vguard - Vehicle registration with QR emergency access
///
/// Register vehicles, hand out their emergency-access links, and let anyone
/// who scans one ask the owner for contact details.
#[derive(Debug, Parser)]
#[command(name = "vguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors; command output on stdout is unaffected
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign up, sign in and out
    #[command(subcommand)]
    Account(AccountCommand),

    /// Register and inspect vehicles
    #[command(subcommand)]
    Vehicle(VehicleCommand),

    /// Raise, follow and resolve emergency requests
    #[command(subcommand)]
    Request(RequestCommand),

    /// Show store statistics
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "vguard");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_quiet_help_describes_logging_only() {
        let command = Cli::command();
        let quiet = command
            .get_arguments()
            .find(|arg| arg.get_id() == "quiet")
            .unwrap();
        let help = quiet.get_help().unwrap().to_string();
        assert!(help.contains("log"));
        assert!(!help.contains("all output"));
    }

    #[test]
    fn test_parse_signup() {
        let args = [
            "vguard", "account", "signup", "--name", "Asha", "--email", "asha@example.com",
            "--password", "pw",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Account(AccountCommand::Signup { ref email, .. }) if email == "asha@example.com"
        ));
    }

    #[test]
    fn test_parse_vehicle_add() {
        let args = [
            "vguard", "vehicle", "add", "--registration", "KA-01", "--model", "Sedan",
            "--owner-name", "Asha", "--owner-contact", "555",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Vehicle(VehicleCommand::Add(add)) = cli.command else {
            panic!("expected vehicle add");
        };
        assert_eq!(add.registration, "KA-01");
        assert!(add.color.is_empty());
    }

    #[test]
    fn test_parse_vehicle_add_requires_fields() {
        let args = ["vguard", "vehicle", "add", "--registration", "KA-01"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_request_create() {
        let args = [
            "vguard", "request", "create", "v1", "-t", "parking", "--image", "photo.jpg",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Request(RequestCommand::Create(create)) = cli.command else {
            panic!("expected request create");
        };
        assert_eq!(create.vehicle_id(), "v1");
        assert_eq!(create.category, CategoryArg::Parking);
        assert!(!create.no_fallback);
    }

    #[test]
    fn test_parse_request_rejects_unknown_category() {
        let args = ["vguard", "request", "create", "v1", "-t", "towing"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_request_watch() {
        let args = ["vguard", "request", "watch", "v1", "--image", "x", "--no-fallback"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Request(RequestCommand::Watch(CreateRequestArgs {
                no_fallback: true,
                ..
            }))
        ));
    }

    #[test]
    fn test_parse_request_approve() {
        let cli = Cli::try_parse_from(["vguard", "request", "approve", "r1"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Request(RequestCommand::Approve { ref id }) if id == "r1"
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["vguard", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vguard", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["vguard", "status", "-q"]).unwrap();
        assert!(cli.quiet);
    }
}
