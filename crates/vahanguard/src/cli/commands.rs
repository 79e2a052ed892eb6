//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::link::vehicle_id_from_link;
use crate::model::{NewVehicle, RequestCategory};

/// Account and session commands.
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Password
        #[arg(long)]
        password: String,
    },

    /// Sign in to an existing account
    Login {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password
        #[arg(long)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Vehicle commands.
#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    /// Register a vehicle for the signed-in account
    Add(AddVehicleArgs),

    /// List the signed-in account's vehicles
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show a vehicle
    Show {
        /// Vehicle id or emergency-access link
        vehicle: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the emergency-access link to encode in the vehicle's QR code
    Link {
        /// Vehicle id
        vehicle: String,
    },
}

/// Arguments for registering a vehicle.
#[derive(Debug, Args)]
pub struct AddVehicleArgs {
    /// Registration (plate) number
    #[arg(long)]
    pub registration: String,

    /// Make and model
    #[arg(long)]
    pub model: String,

    /// Body color
    #[arg(long, default_value = "")]
    pub color: String,

    /// Owner's name
    #[arg(long)]
    pub owner_name: String,

    /// Owner's contact number
    #[arg(long)]
    pub owner_contact: String,

    /// Owner's address
    #[arg(long, default_value = "")]
    pub owner_address: String,

    /// Secondary emergency contact
    #[arg(long, default_value = "")]
    pub emergency_contact: String,
}

impl From<AddVehicleArgs> for NewVehicle {
    fn from(args: AddVehicleArgs) -> Self {
        Self {
            registration_number: args.registration,
            model: args.model,
            color: args.color,
            owner_name: args.owner_name,
            owner_contact: args.owner_contact,
            owner_address: args.owner_address,
            emergency_contact: args.emergency_contact,
        }
    }
}

/// Emergency request commands.
#[derive(Debug, Subcommand)]
pub enum RequestCommand {
    /// Raise a request without waiting for the outcome
    Create(CreateRequestArgs),

    /// Raise a request and follow it until it is resolved
    Watch(CreateRequestArgs),

    /// Show a request's stored status
    Status {
        /// Request id
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List requests raised against one of your vehicles
    List {
        /// Vehicle id or emergency-access link
        vehicle: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Approve a pending request
    Approve {
        /// Request id
        id: String,
    },

    /// Reject a pending request
    Reject {
        /// Request id
        id: String,
    },

    /// Show the owner's details for an approved request
    Disclose {
        /// Request id
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Arguments for raising an emergency request.
#[derive(Debug, Args)]
pub struct CreateRequestArgs {
    /// Vehicle id or emergency-access link
    pub vehicle: String,

    /// Why the request is raised
    #[arg(short = 't', long, value_enum, default_value = "accident")]
    pub category: CategoryArg,

    /// Evidence image (URL, data URL or file path)
    #[arg(short, long, default_value = "")]
    pub image: String,

    /// Describe the situation
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Never show the request as approved before the owner decides
    #[arg(long)]
    pub no_fallback: bool,
}

impl CreateRequestArgs {
    /// The vehicle id, extracted from a link if one was given.
    #[must_use]
    pub fn vehicle_id(&self) -> &str {
        resolve_vehicle(&self.vehicle)
    }
}

/// Accept either a bare vehicle id or a full emergency-access link.
#[must_use]
pub fn resolve_vehicle(input: &str) -> &str {
    vehicle_id_from_link(input).unwrap_or(input)
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Request category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// A collision involving the vehicle
    Accident,
    /// The vehicle is blocking or badly parked
    Parking,
    /// A payment matter with the owner
    Payment,
    /// Anything else
    Other,
}

impl From<CategoryArg> for RequestCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Accident => Self::Accident,
            CategoryArg::Parking => Self::Parking,
            CategoryArg::Payment => Self::Payment,
            CategoryArg::Other => Self::Other,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Plain,
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_arg_conversion() {
        assert_eq!(RequestCategory::from(CategoryArg::Accident), RequestCategory::Accident);
        assert_eq!(RequestCategory::from(CategoryArg::Parking), RequestCategory::Parking);
        assert_eq!(RequestCategory::from(CategoryArg::Payment), RequestCategory::Payment);
        assert_eq!(RequestCategory::from(CategoryArg::Other), RequestCategory::Other);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_resolve_vehicle() {
        assert_eq!(resolve_vehicle("v1"), "v1");
        assert_eq!(
            resolve_vehicle("http://localhost:5173/emergency-access/v1"),
            "v1"
        );
    }

    #[test]
    fn test_add_vehicle_args_conversion() {
        let vehicle = NewVehicle::from(AddVehicleArgs {
            registration: "KA-01".to_string(),
            model: "Sedan".to_string(),
            color: String::new(),
            owner_name: "Asha".to_string(),
            owner_contact: "555".to_string(),
            owner_address: String::new(),
            emergency_contact: "556".to_string(),
        });
        assert_eq!(vehicle.registration_number, "KA-01");
        assert_eq!(vehicle.emergency_contact, "556");
        assert!(vehicle.validate().is_ok());
    }

    #[test]
    fn test_create_request_args_vehicle_id() {
        let args = CreateRequestArgs {
            vehicle: "https://vahan.example/emergency-access/abc?src=qr".to_string(),
            category: CategoryArg::Parking,
            image: "photo.jpg".to_string(),
            description: String::new(),
            no_fallback: false,
        };
        assert_eq!(args.vehicle_id(), "abc");
    }
}
