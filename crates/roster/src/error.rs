//! Error types for roster.
//!
//! This module defines all error types used throughout the roster crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for roster operations.
#[derive(Error, Debug)]
pub enum Error {
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

    // === Registry Errors ===
    /// A referenced record does not exist.
    #[error("{entity} {id} does not exist")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: i64,
    },

    /// The unique index on registration codes rejected a write.
    ///
    /// Another writer claimed the same code between the scan and the save.
    /// The assignment has to be retried from a fresh scan.
    #[error("unique code {code} is already taken")]
    CodeConflict {
        /// The code that collided.
        code: String,
    },

    /// Every sequence number of a year is already in use.
    #[error("no unique codes left for year {year}")]
    SequenceExhausted {
        /// The year whose sequence ran out.
        year: i32,
    },

    /// A stored code does not have the `<year>-<NNNN>` shape.
    #[error("malformed unique code: {code:?}")]
    MalformedCode {
        /// The offending code.
        code: String,
    },

    /// Bulk backfill failed and was rolled back.
    #[error("backfill rolled back, no codes were assigned: {source}")]
    BackfillFailed {
        /// The failure that aborted the run.
        #[source]
        source: Box<Error>,
    },

    /// A field value was rejected before reaching storage.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the rejected field.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for roster operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for a registration.
    #[must_use]
    pub fn registration_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "registration",
            id,
        }
    }

    /// Create a not-found error for the vitals of a registration.
    #[must_use]
    pub fn vitals_not_found(registration_id: i64) -> Self {
        Self::NotFound {
            entity: "vitals for registration",
            id: registration_id,
        }
    }

    /// Create a validation error for the given field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wrap a failure that aborted a backfill run.
    #[must_use]
    pub fn backfill_failed(source: Self) -> Self {
        Self::BackfillFailed {
            source: Box::new(source),
        }
    }

    /// Check if this error means the referenced record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a lost race for a unique code.
    #[must_use]
    pub fn is_code_conflict(&self) -> bool {
        matches!(self, Self::CodeConflict { .. })
    }
}
