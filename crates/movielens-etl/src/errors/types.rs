//! Error type definitions for the ETL pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }
}

/// Table store errors
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Table not found: {table}")]
    NotFound { table: String },

    #[error("Invalid identifier: '{identifier}'")]
    InvalidIdentifier { identifier: String },

    #[error("Cannot replace {target} with {source_table} from another database")]
    CrossDatabase { source_table: String, target: String },

    #[error("Malformed row in {table}: {message}")]
    MalformedRow { table: String, message: String },

    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Durable storage errors.
///
/// The bridge never panics or raises past its boundary; every failure is
/// folded into one of these with the closest `io::ErrorKind`.
#[derive(Error, Debug)]
#[error("Storage {operation} failed ({kind}): {message}")]
pub struct StorageError {
    pub operation: &'static str,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(operation: &'static str, kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    pub fn from_io(operation: &'static str, error: io::Error) -> Self {
        Self::new(operation, error.kind(), error.to_string())
    }
}

/// Dataset download and extraction errors
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Archive {path:?} could not be extracted: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("I/O error during acquisition: {0}")]
    Io(#[from] io::Error),
}

/// Staged dataset parsing errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Dataset file missing: {path:?}")]
    MissingFile { path: PathBuf },

    #[error("Failed to parse {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Export and finalization errors
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No finalized '{base_name}' file in {dir:?}")]
    NoFinalizedFile { dir: PathBuf, base_name: String },

    #[error("Partition {path:?} has a header that differs from the first partition")]
    HeaderMismatch { path: PathBuf },
}

impl OutputError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        OutputError::Io {
            path: path.into(),
            source,
        }
    }
}
