//! Turns a partitioned export directory into one consumer-facing file.
//!
//! `_`-prefixed markers are removed. A single `part-*` file is renamed to
//! `{base}_{timestamp}.csv`; several are merged in lexical name order under
//! one header.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{MARKER_PREFIX, PARTITION_PREFIX};
use crate::errors::{OutputError, OutputResult};
use crate::models::TopRatedEntry;

/// Sortable, second-resolution stamp embedded in finalized file names
pub const FINALIZED_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFinalizer;

impl OutputFinalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn finalized_name(base_name: &str, at: &DateTime<Local>) -> String {
        format!("{}_{}.csv", base_name, at.format(FINALIZED_TIMESTAMP_FORMAT))
    }

    /// Finalize `dir` now. Returns the finalized file, or `None` when the
    /// directory held no partitions.
    pub fn finalize(&self, dir: &Path, base_name: &str) -> OutputResult<Option<PathBuf>> {
        self.finalize_at(dir, base_name, Local::now())
    }

    pub fn finalize_at(
        &self,
        dir: &Path,
        base_name: &str,
        at: DateTime<Local>,
    ) -> OutputResult<Option<PathBuf>> {
        debug!("Finalizing output in {:?}", dir);

        let mut partitions = Vec::new();
        let entries = fs::read_dir(dir).map_err(|e| OutputError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| OutputError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if name.starts_with(MARKER_PREFIX) {
                remove_entry(&path)?;
                debug!("Removed marker {}", name);
            } else if name.starts_with(PARTITION_PREFIX) && path.is_file() {
                partitions.push(path);
            }
        }
        partitions.sort();

        let target = dir.join(Self::finalized_name(base_name, &at));
        match partitions.as_slice() {
            [] => {
                info!("No partitions in {:?}; nothing to finalize", dir);
                Ok(None)
            }
            [single] => {
                fs::rename(single, &target).map_err(|e| OutputError::io(single, e))?;
                info!("Output finalized: {:?}", target);
                Ok(Some(target))
            }
            many => {
                merge_partitions(many, &target)?;
                for partition in many {
                    fs::remove_file(partition).map_err(|e| OutputError::io(partition, e))?;
                }
                info!(
                    "Output finalized: {:?} (merged {} partitions)",
                    target,
                    many.len()
                );
                Ok(Some(target))
            }
        }
    }
}

fn remove_entry(path: &Path) -> OutputResult<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OutputError::io(path, e)),
    }
}

fn merge_partitions(partitions: &[PathBuf], target: &Path) -> OutputResult<()> {
    let mut writer = csv::Writer::from_path(target)?;
    let mut expected_header: Option<csv::StringRecord> = None;

    for partition in partitions {
        let mut reader = csv::Reader::from_path(partition)?;
        let header = reader.headers()?.clone();
        match &expected_header {
            None => {
                writer.write_record(&header)?;
                expected_header = Some(header);
            }
            Some(expected) if *expected != header => {
                return Err(OutputError::HeaderMismatch {
                    path: partition.clone(),
                });
            }
            Some(_) => {}
        }
        for record in reader.records() {
            writer.write_record(&record?)?;
        }
    }

    writer.flush().map_err(|e| OutputError::io(target, e))
}

/// Newest `{base}_{timestamp}.csv` in `dir`
pub fn latest_finalized(dir: &Path, base_name: &str) -> OutputResult<PathBuf> {
    let prefix = format!("{base_name}_");
    let entries = fs::read_dir(dir).map_err(|e| OutputError::io(dir, e))?;

    let mut newest: Option<(String, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| OutputError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".csv"))
        else {
            continue;
        };
        if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if newest.as_ref().is_none_or(|(best, _)| name > *best) {
            newest = Some((name, entry.path()));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| OutputError::NoFinalizedFile {
            dir: dir.to_path_buf(),
            base_name: base_name.to_string(),
        })
}

/// Read a finalized top-rated export back
pub fn read_top_rated(path: &Path) -> OutputResult<Vec<TopRatedEntry>> {
    let mut reader = csv::Reader::from_path(path)?;
    let entries = reader.deserialize().collect::<Result<Vec<TopRatedEntry>, _>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_markers_removed_and_single_partition_renamed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_SUCCESS"), "").unwrap();
        fs::write(temp.path().join("_committed_123"), "").unwrap();
        fs::write(temp.path().join("part-00000"), "title\nalpha\n").unwrap();

        let finalized = OutputFinalizer::new()
            .finalize_at(temp.path(), "top_movies", at())
            .unwrap()
            .unwrap();

        assert_eq!(names(temp.path()), vec!["top_movies_20240309140507.csv"]);
        assert_eq!(fs::read_to_string(finalized).unwrap(), "title\nalpha\n");
    }

    #[test]
    fn test_marker_directories_are_removed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("_temporary/0")).unwrap();
        fs::write(temp.path().join("part-00000-a.csv"), "title\n").unwrap();

        OutputFinalizer::new()
            .finalize_at(temp.path(), "top", at())
            .unwrap();

        assert_eq!(names(temp.path()), vec!["top_20240309140507.csv"]);
    }

    #[test]
    fn test_no_partitions_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_SUCCESS"), "").unwrap();

        let finalized = OutputFinalizer::new()
            .finalize_at(temp.path(), "top_movies", at())
            .unwrap();

        assert!(finalized.is_none());
        assert!(names(temp.path()).is_empty());
    }

    #[test]
    fn test_multiple_partitions_merge_in_name_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("part-00001-x.csv"), "title\ngamma\n").unwrap();
        fs::write(temp.path().join("part-00000-x.csv"), "title\nalpha\nbeta\n").unwrap();
        fs::write(temp.path().join("_SUCCESS"), "").unwrap();

        let finalized = OutputFinalizer::new()
            .finalize_at(temp.path(), "top_movies", at())
            .unwrap()
            .unwrap();

        assert_eq!(names(temp.path()), vec!["top_movies_20240309140507.csv"]);
        assert_eq!(
            fs::read_to_string(finalized).unwrap(),
            "title\nalpha\nbeta\ngamma\n"
        );
    }

    #[test]
    fn test_mismatched_partition_headers_are_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("part-00000.csv"), "title\nalpha\n").unwrap();
        fs::write(temp.path().join("part-00001.csv"), "name\nbeta\n").unwrap();

        let err = OutputFinalizer::new()
            .finalize_at(temp.path(), "top_movies", at())
            .unwrap_err();

        assert!(matches!(err, OutputError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_latest_finalized_picks_newest_stamp() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("top_movies_20240101000000.csv"), "title\nold\n").unwrap();
        fs::write(temp.path().join("top_movies_20240309140507.csv"), "title\nnew\n").unwrap();
        fs::write(temp.path().join("top_movies_latest.csv"), "title\nignored\n").unwrap();
        fs::write(temp.path().join("other_20250101000000.csv"), "title\nother\n").unwrap();

        let latest = latest_finalized(temp.path(), "top_movies").unwrap();
        let titles: Vec<String> = read_top_rated(&latest)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();

        assert_eq!(titles, vec!["new"]);
    }

    #[test]
    fn test_latest_finalized_without_match_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            latest_finalized(temp.path(), "top_movies"),
            Err(OutputError::NoFinalizedFile { .. })
        ));
    }
}
