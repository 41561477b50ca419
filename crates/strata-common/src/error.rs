//! Error types for Strata
//!
//! This module defines the common error types used by the archive, build
//! and check engines.

use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

/// Common result type for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Strata
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv { path: PathBuf, source: ArrowError },

    // Lookup errors
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("cannot find column named \"{column}\"")]
    ColumnNotFound { column: String },

    #[error("file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    // Content errors
    #[error("malformed ledger line: {line:?}")]
    MalformedLine { line: String },

    #[error("more than one value exists under the \"{column}\" column")]
    InconsistentMetadata { column: String },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("table error: {0}")]
    Table(String),

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Wrap an Arrow CSV error with the file it occurred in
    pub fn csv(path: impl Into<PathBuf>, source: ArrowError) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Create a table error
    pub fn table(msg: impl Into<String>) -> Self {
        Self::Table(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileNotFound { .. } | Self::ColumnNotFound { .. } => true,
            Self::Io(e) | Self::IoAt { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Check if this error reports a file that must not be overwritten
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::Io(e) | Self::IoAt { source: e, .. } => {
                e.kind() == std::io::ErrorKind::AlreadyExists
            }
            _ => false,
        }
    }

    /// Check if the input itself was unreadable as CSV
    #[must_use]
    pub const fn is_unparseable(&self) -> bool {
        matches!(self, Self::Csv { .. })
    }
}
