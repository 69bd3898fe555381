//! Partitioned CSV writer
//!
//! Output directories are always replaced, never appended to, so a retried
//! export can not mix partitions from two runs.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::PARTITION_PREFIX;
use crate::errors::{OutputError, OutputResult};

pub const SUCCESS_MARKER: &str = "_SUCCESS";

#[derive(Debug, Clone)]
pub struct PartitionWriteSummary {
    pub job_id: Uuid,
    pub partitions: Vec<PathBuf>,
    pub records: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PartitionedCsvWriter {
    /// 0 writes everything into a single partition
    max_records_per_partition: usize,
}

impl PartitionedCsvWriter {
    pub fn new(max_records_per_partition: usize) -> Self {
        Self {
            max_records_per_partition,
        }
    }

    pub fn partition_name(index: usize, job_id: &Uuid) -> String {
        format!("{PARTITION_PREFIX}{index:05}-{job_id}.csv")
    }

    fn chunks<'a, T>(&self, records: &'a [T]) -> Vec<&'a [T]> {
        if self.max_records_per_partition == 0 || records.len() <= self.max_records_per_partition
        {
            vec![records]
        } else {
            records.chunks(self.max_records_per_partition).collect()
        }
    }

    /// Replace `dir` with header-carrying partition files holding `records`
    pub fn write<T: Serialize>(
        &self,
        dir: &Path,
        header: &[&str],
        records: &[T],
    ) -> OutputResult<PartitionWriteSummary> {
        let job_id = Uuid::new_v4();
        debug!("Writing {} records to {:?} (job {})", records.len(), dir, job_id);

        match fs::remove_dir_all(dir) {
            Ok(()) => debug!("Replaced existing output directory {:?}", dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(OutputError::io(dir, e)),
        }
        fs::create_dir_all(dir).map_err(|e| OutputError::io(dir, e))?;

        touch(&dir.join(format!("_started_{}", job_id.simple())))?;

        let mut partitions = Vec::new();
        for (index, chunk) in self.chunks(records).into_iter().enumerate() {
            let path = dir.join(Self::partition_name(index, &job_id));
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&path)?;
            writer.write_record(header)?;
            for record in chunk {
                writer.serialize(record)?;
            }
            writer.flush().map_err(|e| OutputError::io(&path, e))?;
            partitions.push(path);
        }

        touch(&dir.join(format!("_committed_{}", job_id.simple())))?;
        touch(&dir.join(SUCCESS_MARKER))?;

        info!(
            "Export written: dir={:?} records={} partitions={}",
            dir,
            records.len(),
            partitions.len()
        );
        Ok(PartitionWriteSummary {
            job_id,
            partitions,
            records: records.len(),
        })
    }
}

fn touch(path: &Path) -> OutputResult<()> {
    fs::write(path, b"").map_err(|e| OutputError::io(path, e))
}
