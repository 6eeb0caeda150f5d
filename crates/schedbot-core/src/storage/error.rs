//! Storage error handling
//!
//! Provides typed errors for storage operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database file cannot be opened or written
    #[error("Database is read-only or cannot be opened: {0}")]
    ReadOnly(#[source] rusqlite::Error),

    /// Another connection held the lock for longer than the busy timeout
    #[error("Database is locked: {0}")]
    Locked(#[source] rusqlite::Error),

    /// The file is not a database or its pages are damaged
    #[error("Database is corrupted: {0}")]
    Corrupt(#[source] rusqlite::Error),

    /// Disk is full or quota exceeded
    #[error("Disk full or quota exceeded while writing the database: {0}")]
    DiskFull(#[source] rusqlite::Error),

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other SQLite error
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StorageError {
    /// Classifies the error by its SQLite result code
    fn from(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Locked(error)
            }
            Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
                StorageError::Corrupt(error)
            }
            Some(ErrorCode::DiskFull) => StorageError::DiskFull(error),
            Some(ErrorCode::ReadOnly)
            | Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::PermissionDenied) => StorageError::ReadOnly(error),
            _ => StorageError::Database(error),
        }
    }
}

impl StorageError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Check if the operation may succeed when retried later
    ///
    /// Only lock contention qualifies; everything else needs operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Locked(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::Locked(_) => {
                Some("Another process is holding the database. Stop the running bot and try again.")
            }
            StorageError::DiskFull(_) => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } | StorageError::ReadOnly(_) => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            StorageError::Corrupt(_) => {
                Some("Restore the database from a backup, or remove it and re-run the migration.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
