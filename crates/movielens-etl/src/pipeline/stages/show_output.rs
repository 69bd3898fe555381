//! Reads the finalized export back and logs it

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::stage_ids;
use crate::database::{TableRef, TableStore};
use crate::output::read_latest_top_rated;
use crate::pipeline::error::PipelineError;
use crate::pipeline::traits::{PipelineStage, StageMetrics};

pub struct ShowOutputStage {
    store: Arc<dyn TableStore>,
    exploded_table: TableRef,
    output_dir: PathBuf,
    output_name: String,
}

impl ShowOutputStage {
    pub fn new(
        store: Arc<dyn TableStore>,
        exploded_table: TableRef,
        output_dir: PathBuf,
        output_name: String,
    ) -> Self {
        Self {
            store,
            exploded_table,
            output_dir,
            output_name,
        }
    }
}

#[async_trait]
impl PipelineStage for ShowOutputStage {
    fn stage_id(&self) -> &'static str {
        stage_ids::SHOW_OUTPUT
    }

    fn stage_name(&self) -> &'static str {
        "Show Output"
    }

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError> {
        let (path, entries) =
            read_latest_top_rated(self.output_dir.clone(), self.output_name.clone())
                .await
                .map_err(|e| PipelineError::export("reading the finalized export", e))?;

        info!("Top rated movies ({}):", path.display());
        for (rank, entry) in entries.iter().enumerate() {
            info!("  {:>2}. {}", rank + 1, entry.title);
        }

        let exploded_rows = self
            .store
            .count_rows(&self.exploded_table)
            .await
            .map_err(|e| PipelineError::export(format!("counting {}", self.exploded_table), e))?;
        info!("Table {} holds {} rows", self.exploded_table, exploded_rows);

        let mut metrics = StageMetrics::new();
        metrics.insert("titles".to_string(), serde_json::json!(entries.len()));
        metrics.insert("exploded_rows".to_string(), serde_json::json!(exploded_rows));
        Ok(metrics)
    }
}
