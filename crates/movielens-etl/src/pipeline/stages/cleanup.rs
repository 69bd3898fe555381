//! Removes durable working paths so the next run starts clean.
//!
//! Every path is attempted; failures are logged and reported together.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::stage_ids;
use crate::pipeline::error::PipelineError;
use crate::pipeline::traits::{PipelineStage, StageMetrics};
use crate::storage::StorageBridge;
use crate::utils::human_format::format_duration_precise;

pub struct CleanupStage {
    bridge: Arc<dyn StorageBridge>,
    paths: Vec<String>,
}

impl CleanupStage {
    pub fn new(bridge: Arc<dyn StorageBridge>, paths: Vec<String>) -> Self {
        Self { bridge, paths }
    }
}

#[async_trait]
impl PipelineStage for CleanupStage {
    fn stage_id(&self) -> &'static str {
        stage_ids::CLEANUP
    }

    fn stage_name(&self) -> &'static str {
        "Cleanup"
    }

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError> {
        let cleanup_start = Instant::now();
        let mut failed = Vec::new();

        for path in &self.paths {
            debug!("Removing {}", path);
            if let Err(e) = self.bridge.remove(path, true).await {
                error!("Failed to remove {}: {}", path, e);
                failed.push(path.clone());
            }
        }

        info!(
            "Cleanup completed: removed={} failed={} duration={}",
            self.paths.len() - failed.len(),
            failed.len(),
            format_duration_precise(cleanup_start.elapsed())
        );

        if !failed.is_empty() {
            return Err(PipelineError::cleanup(format!(
                "could not remove {}",
                failed.join(", ")
            )));
        }

        let mut metrics = StageMetrics::new();
        metrics.insert("removed".to_string(), serde_json::json!(self.paths.len()));
        Ok(metrics)
    }
}
