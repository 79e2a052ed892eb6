//! `vahanguard` - Vehicle registration with QR emergency access
//!
//! Owners register vehicles and print a QR code carrying each vehicle's
//! emergency-access link. Anyone who scans it can raise an emergency request;
//! the owner's contact details are disclosed only once that request is approved.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod access;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod link;
pub mod logging;
pub mod model;
pub mod registry;
pub mod storage;
pub mod workflow;

pub use access::{AccessForm, AccessView, EmergencyAccess};
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{IdentityStore, SecretScheme};
pub use link::{deep_link, vehicle_id_from_link};
pub use logging::init_logging;
pub use model::{Account, EmergencyRequest, OwnerDetails, RequestCategory, RequestStatus, Vehicle};
pub use registry::{VehicleLookup, VehicleRegistry};
pub use storage::{CollectionStore, MemoryStore, SqliteStore, StoreStats};
pub use workflow::{Disclosure, EmergencyWorkflow, WatchHandle};
