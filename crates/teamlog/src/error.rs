//! Error types for teamlog.
//!
//! This module defines all error types used throughout the teamlog crate.
//! Domain failures (validation, identity conflicts, missing records) are kept
//! separate from infrastructure failures so callers at the boundary can map
//! them to user-facing responses.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Member;

/// The main error type for teamlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Roster Errors ===
    /// A required field was missing or empty.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// Another member already holds the requested identity hash.
    #[error("identity already assigned to {}", existing.full_name())]
    DuplicateIdentity {
        /// The member currently holding the identity.
        existing: Box<Member>,
    },

    /// The referenced position does not exist.
    #[error("unknown position id {0}")]
    UnknownPosition(i64),

    /// A position with this name already exists.
    #[error("position '{0}' already exists")]
    DuplicatePosition(String),

    /// The referenced member does not exist.
    #[error("member {0} not found")]
    MemberNotFound(i64),

    /// Resolver input was empty after trimming.
    #[error("no name or identifier given")]
    EmptyInput,

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The store was populated with a different identity digest.
    #[error("database hashes identities with {stored}, but configuration selects {configured}")]
    IdentityDigestMismatch {
        /// Digest recorded in the database.
        stored: String,
        /// Digest selected by the configuration.
        configured: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for teamlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error for the named field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the targeted record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MemberNotFound(_) | Self::UnknownPosition(_))
    }

    /// Check if this error is a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentity { .. } | Self::DuplicatePosition(_)
        )
    }

    /// Check if this error is something the caller can correct and resubmit.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::EmptyInput)
            || self.is_not_found()
            || self.is_conflict()
    }

    /// Process exit status for a command that failed with this error.
    ///
    /// `3` for a missing record, `4` for a uniqueness conflict, `2` for any
    /// other input the caller can correct, and `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.is_not_found() {
            3
        } else if self.is_conflict() {
            4
        } else if self.is_user_error() {
            2
        } else {
            1
        }
    }
}
