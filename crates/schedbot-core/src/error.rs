//! Crate-level error types
//!
//! Three kinds of failure reach callers:
//! - `Validation`: the caller passed data that breaks a field invariant;
//!   nothing was written.
//! - `Parse`: the legacy document exists but is not well-formed;
//!   nothing was written.
//! - `Storage`: the SQLite medium failed (locked, read-only, corrupt...).
//!
//! A missing record is never an error; lookups return `Option`.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Caller-supplied data violating a field invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Chat file name must not be empty")]
    EmptyFileName,

    #[error("Setting key must not be empty")]
    EmptySettingKey,

    #[error("Unknown format '{0}', expected one of: photo, pdf")]
    UnknownFormat(String),

    #[error("Check interval must be at least 1 minute, got {0}")]
    InvalidCheckInterval(u32),

    #[error("Setting '{key}' holds '{value}', which is not a valid value")]
    InvalidSettingValue { key: String, value: String },
}

/// Errors returned by the store and the migration tool
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Legacy document '{path}' is malformed: {details}")]
    Parse { path: PathBuf, details: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Error::Storage(StorageError::from(error))
    }
}

impl Error {
    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Validation(_) => Some("Fix the input and try again."),
            Error::Parse { .. } => Some(
                "Repair the legacy document and re-run the migration. It has not been modified.",
            ),
            Error::Storage(e) => e.recovery_suggestion(),
        }
    }
}

/// Result type for store and migration operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = Error::Parse {
            path: PathBuf::from("/data/bot_database.json"),
            details: "expected value at line 1 column 1".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("malformed"));
        assert!(msg.contains("bot_database.json"));
        assert!(err.recovery_suggestion().unwrap().contains("not been modified"));
    }

    #[test]
    fn test_sqlite_errors_become_storage_errors() {
        let err = Error::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::from(ValidationError::EmptyFileName);
        assert!(err.to_string().contains("file name"));
    }
}
