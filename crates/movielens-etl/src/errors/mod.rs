//! Centralized error handling for the ETL pipeline
//!
//! Every collaborator boundary has its own error type so callers can decide
//! what is fatal:
//!
//! - **Table Errors**: warehouse reads/writes and identifier checks
//! - **Storage Errors**: durable storage copy/remove, carrying an `io::ErrorKind`
//! - **Acquisition Errors**: dataset download and archive extraction
//! - **Source Errors**: parsing the staged dataset CSV files
//! - **Output Errors**: partitioned CSV export and finalization
//!
//! Stage-level classification lives in [`crate::pipeline::PipelineError`].

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for table store Results
pub type TableResult<T> = Result<T, TableError>;

/// Convenience type alias for storage bridge Results
pub type StorageResult<T> = Result<T, StorageError>;

/// Convenience type alias for output Results
pub type OutputResult<T> = Result<T, OutputError>;
