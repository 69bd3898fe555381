//! File exports
//!
//! Exports are written the way a distributed engine writes them (partition
//! files plus bookkeeping markers) and then finalized into one consumer-facing
//! `{base}_{timestamp}.csv`.

pub mod export;
pub mod finalizer;
pub mod partition_writer;

pub use export::{EXPORT_HEADER, ExportOutcome, read_latest_top_rated, write_top_rated};
pub use finalizer::{
    FINALIZED_TIMESTAMP_FORMAT, OutputFinalizer, latest_finalized, read_top_rated,
};
pub use partition_writer::{PartitionWriteSummary, PartitionedCsvWriter, SUCCESS_MARKER};

/// Files whose name starts with this are writer bookkeeping, never data
pub const MARKER_PREFIX: char = '_';

/// Name prefix of data partition files
pub const PARTITION_PREFIX: &str = "part-";
