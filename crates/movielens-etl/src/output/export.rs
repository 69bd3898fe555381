//! Async entry points for the export directory
//!
//! Partition writing, finalization and readback are plain filesystem and CSV
//! work, so they run on the blocking pool instead of a runtime worker.

use std::io;
use std::path::{Path, PathBuf};

use super::{OutputFinalizer, PartitionWriteSummary, PartitionedCsvWriter, latest_finalized, read_top_rated};
use crate::errors::{OutputError, OutputResult};
use crate::models::TopRatedEntry;

pub const EXPORT_HEADER: &[&str] = &["title"];

/// Result of writing and finalizing one export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub summary: PartitionWriteSummary,
    pub finalized: Option<PathBuf>,
}

fn join_error(dir: &Path, error: tokio::task::JoinError) -> OutputError {
    OutputError::io(dir, io::Error::other(error))
}

/// Replace `dir` with `entries` as partitions and finalize them into
/// `{base_name}_{timestamp}.csv`
pub async fn write_top_rated(
    writer: PartitionedCsvWriter,
    finalizer: OutputFinalizer,
    dir: PathBuf,
    base_name: String,
    entries: Vec<TopRatedEntry>,
) -> OutputResult<ExportOutcome> {
    let task_dir = dir.clone();
    tokio::task::spawn_blocking(move || -> OutputResult<ExportOutcome> {
        let summary = writer.write(&task_dir, EXPORT_HEADER, &entries)?;
        let finalized = finalizer.finalize(&task_dir, &base_name)?;
        Ok(ExportOutcome { summary, finalized })
    })
    .await
    .map_err(|e| join_error(&dir, e))?
}

/// Locate the newest finalized export in `dir` and read it back
pub async fn read_latest_top_rated(
    dir: PathBuf,
    base_name: String,
) -> OutputResult<(PathBuf, Vec<TopRatedEntry>)> {
    let task_dir = dir.clone();
    tokio::task::spawn_blocking(move || -> OutputResult<(PathBuf, Vec<TopRatedEntry>)> {
        let path = latest_finalized(&task_dir, &base_name)?;
        let entries = read_top_rated(&path)?;
        Ok((path, entries))
    })
    .await
    .map_err(|e| join_error(&dir, e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(titles: &[&str]) -> Vec<TopRatedEntry> {
        titles
            .iter()
            .map(|title| TopRatedEntry {
                title: title.to_string(),
            })
            .collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_write_then_read_back_on_single_threaded_runtime() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("top_10");

        let outcome = write_top_rated(
            PartitionedCsvWriter::new(1),
            OutputFinalizer::new(),
            dir.clone(),
            "top_movies".to_string(),
            entries(&["alpha", "beta"]),
        )
        .await
        .unwrap();

        assert_eq!(outcome.summary.partitions.len(), 2);
        let finalized = outcome.finalized.unwrap();
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        let (path, read) = read_latest_top_rated(dir, "top_movies".to_string())
            .await
            .unwrap();
        assert_eq!(path, finalized);
        assert_eq!(read, entries(&["alpha", "beta"]));
    }

    #[tokio::test]
    async fn test_read_back_without_export_is_an_error() {
        let temp = TempDir::new().unwrap();

        let err = read_latest_top_rated(temp.path().to_path_buf(), "top_movies".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, OutputError::NoFinalizedFile { .. }));
    }
}
