//! Error types for vahanguard.
//!
//! One enum covers every failure the library reports: bad input, missing
//! records, identity problems, illegal request transitions and infrastructure.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::RequestStatus;

/// The main error type for vahanguard operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A required field was missing or malformed.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the validation failure.
        message: String,
    },

    // === Lookup Errors ===
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        kind: &'static str,
        /// The identifier that did not resolve.
        id: String,
    },

    // === Identity Errors ===
    /// Signup was attempted with an email that is already registered.
    #[error("an account with email {email} already exists")]
    DuplicateEmail {
        /// The conflicting email address.
        email: String,
    },

    /// No account matched the supplied email and secret.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The operation requires a signed-in account.
    #[error("not signed in")]
    Unauthenticated,

    // === Workflow Errors ===
    /// A request was asked to leave a terminal state.
    #[error("request {id} is {from} and cannot become {to}")]
    InvalidTransition {
        /// The request identifier.
        id: String,
        /// The status the request currently holds.
        from: RequestStatus,
        /// The status that was requested.
        to: RequestStatus,
    },

    // === Storage Errors ===
    /// The document database could not be opened.
    #[error("cannot open document database {path}: {source}")]
    DatabaseOpen {
        /// Database file that was being opened.
        path: PathBuf,
        /// Reported by `SQLite`.
        #[source]
        source: rusqlite::Error,
    },

    /// Reading or writing a document failed.
    #[error("document store error: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The database schema could not be brought up to date.
    #[error("schema migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// The layered configuration could not be read or parsed.
    #[error("cannot load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Which value is wrong and why.
        message: String,
    },

    // === I/O Errors ===
    /// A filesystem call failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was being created.
        path: PathBuf,
        /// Reported by the OS.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// A stored document is not valid JSON for its collection.
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// A lock was poisoned or another invariant broke.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for vahanguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for the named field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a not-found error for an entity kind and identifier.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a failed lookup.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a rejected state transition.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
