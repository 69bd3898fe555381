//! Stages the dataset on durable storage and loads it into the warehouse
//!
//! The local dataset directory is uploaded to `{remote_root}/{dataset}`. When
//! it is absent locally (no download this run) it is pulled back from there
//! first. The CSV files are then loaded into the movies, ratings and tags
//! tables, and `ratings_update` is derived with a `rated_at` column.
//!
//! All four tables are written to scratch tables and published in one
//! transaction. A failed load leaves the previous run's tables untouched.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::stage_ids;
use crate::database::table_store::PipelineTables;
use crate::database::{TableRef, TableStore};
use crate::errors::{SourceError, TableError};
use crate::pipeline::error::PipelineError;
use crate::pipeline::traits::{PipelineStage, StageMetrics};
use crate::sources::{StagedDataset, load_dataset};
use crate::storage::{CopyOptions, StorageBridge};
use crate::utils::human_format::format_duration_precise;

pub struct StagingStage {
    bridge: Arc<dyn StorageBridge>,
    store: Arc<dyn TableStore>,
    tables: PipelineTables,
    local_dataset_dir: PathBuf,
    remote_dataset_path: String,
}

impl StagingStage {
    pub fn new(
        bridge: Arc<dyn StorageBridge>,
        store: Arc<dyn TableStore>,
        tables: PipelineTables,
        local_dataset_dir: PathBuf,
        remote_dataset_path: String,
    ) -> Self {
        Self {
            bridge,
            store,
            tables,
            local_dataset_dir,
            remote_dataset_path,
        }
    }

    async fn stage_files(&self) -> Result<&'static str, PipelineError> {
        let local = self.local_dataset_dir.to_string_lossy().into_owned();

        if tokio::fs::try_exists(&self.local_dataset_dir)
            .await
            .unwrap_or(false)
        {
            debug!("Uploading {} to {}", local, self.remote_dataset_path);
            self.bridge
                .copy(&local, &self.remote_dataset_path, CopyOptions::recursive_overwrite())
                .await
                .map_err(|e| {
                    PipelineError::staging(format!("upload to {} failed", self.remote_dataset_path), e)
                })?;
            info!("Dataset uploaded to {}", self.remote_dataset_path);
            Ok("uploaded")
        } else {
            warn!(
                "Local dataset {} missing; pulling it from {}",
                local, self.remote_dataset_path
            );
            self.bridge
                .copy(&self.remote_dataset_path, &local, CopyOptions::recursive_overwrite())
                .await
                .map_err(|e| {
                    PipelineError::staging(
                        format!("download from {} failed", self.remote_dataset_path),
                        e,
                    )
                })?;
            Ok("pulled")
        }
    }

    async fn load_tables(&self) -> Result<StageMetrics, TableLoadError> {
        let dataset = load_dataset(self.local_dataset_dir.clone()).await?;

        let targets = [
            &self.tables.movies,
            &self.tables.ratings,
            &self.tables.tags,
            &self.tables.ratings_update,
        ];
        let scratch = targets.map(TableRef::scratch);

        let counts = match self.write_scratch(&scratch, &dataset).await {
            Ok(counts) => counts,
            Err(e) => {
                self.drop_scratch(&scratch).await;
                return Err(e.into());
            }
        };

        let replacements: Vec<(TableRef, TableRef)> = scratch
            .iter()
            .cloned()
            .zip(targets.into_iter().cloned())
            .collect();
        if let Err(e) = self.store.replace_tables(&replacements).await {
            self.drop_scratch(&scratch).await;
            return Err(e.into());
        }

        let mut metrics = StageMetrics::new();
        for (name, count) in ["movies", "ratings", "tags", "ratings_update"].iter().zip(counts) {
            metrics.insert(name.to_string(), serde_json::json!(count));
        }
        Ok(metrics)
    }

    /// Fills `scratch` in movies, ratings, tags, ratings_update order
    async fn write_scratch(
        &self,
        scratch: &[TableRef; 4],
        dataset: &StagedDataset,
    ) -> Result<[u64; 4], TableError> {
        Ok([
            self.store.overwrite_movies(&scratch[0], &dataset.movies).await?,
            self.store.overwrite_ratings(&scratch[1], &dataset.ratings).await?,
            self.store.overwrite_tags(&scratch[2], &dataset.tags).await?,
            self.store
                .overwrite_ratings_update(&scratch[3], &dataset.ratings)
                .await?,
        ])
    }

    async fn drop_scratch(&self, scratch: &[TableRef]) {
        for table in scratch {
            if let Err(e) = self.store.drop_table(table).await {
                warn!("Could not drop scratch table {}: {}", table, e);
            }
        }
    }
}

/// Either side of the warehouse load can fail
#[derive(Debug, thiserror::Error)]
enum TableLoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[async_trait]
impl PipelineStage for StagingStage {
    fn stage_id(&self) -> &'static str {
        stage_ids::STAGING
    }

    fn stage_name(&self) -> &'static str {
        "Stage Dataset"
    }

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError> {
        let started = Instant::now();

        let transfer = self.stage_files().await?;
        let mut metrics = self
            .load_tables()
            .await
            .map_err(|e| PipelineError::staging("warehouse load failed", e))?;
        metrics.insert("transfer".to_string(), serde_json::json!(transfer));

        info!(
            "Staging completed: database={} duration={}",
            self.tables.movies.database(),
            format_duration_precise(started.elapsed())
        );
        Ok(metrics)
    }

    async fn has_fallback(&self) -> bool {
        let movies = self.store.table_exists(&self.tables.movies).await;
        let ratings = self.store.table_exists(&self.tables.ratings).await;
        match (movies, ratings) {
            (Ok(true), Ok(true)) => true,
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not check for previously staged tables: {}", e);
                false
            }
            _ => false,
        }
    }
}
