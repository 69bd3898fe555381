//! Downloads and unpacks the dataset archive

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::stage_ids;
use crate::pipeline::error::PipelineError;
use crate::pipeline::traits::{PipelineStage, StageMetrics};
use crate::sources::DatasetAcquirer;
use crate::utils::human_format::format_duration_precise;

pub struct AcquireStage {
    acquirer: Arc<dyn DatasetAcquirer>,
    dataset_url: String,
    datasets_dir: PathBuf,
    zip_name: String,
}

impl AcquireStage {
    pub fn new(
        acquirer: Arc<dyn DatasetAcquirer>,
        dataset_url: String,
        datasets_dir: PathBuf,
        zip_name: String,
    ) -> Self {
        Self {
            acquirer,
            dataset_url,
            datasets_dir,
            zip_name,
        }
    }
}

#[async_trait]
impl PipelineStage for AcquireStage {
    fn stage_id(&self) -> &'static str {
        stage_ids::ACQUIRE
    }

    fn stage_name(&self) -> &'static str {
        "Acquire Dataset"
    }

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError> {
        let started = Instant::now();
        debug!(
            "Acquiring {} into {:?}",
            self.dataset_url, self.datasets_dir
        );

        let dataset_dir = self
            .acquirer
            .acquire(&self.dataset_url, &self.datasets_dir, &self.zip_name)
            .await
            .map_err(|e| {
                PipelineError::acquisition(format!("could not acquire {}", self.dataset_url), e)
            })?;

        info!(
            "Dataset acquired: dir={:?} duration={}",
            dataset_dir,
            format_duration_precise(started.elapsed())
        );

        let mut metrics = StageMetrics::new();
        metrics.insert(
            "dataset_dir".to_string(),
            serde_json::json!(dataset_dir.to_string_lossy()),
        );
        Ok(metrics)
    }
}
