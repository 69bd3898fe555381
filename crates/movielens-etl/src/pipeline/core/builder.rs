//! Pipeline Builder
//!
//! Assembles a [`PipelineOrchestrator`] from an [`EtlConfig`]: one stage per
//! step, gated by the `[controls]` flags, plus the cleanup stage.

use std::sync::Arc;
use tracing::debug;

use crate::config::EtlConfig;
use crate::database::TableStore;
use crate::database::table_store::PipelineTables;
use crate::output::PartitionedCsvWriter;
use crate::pipeline::core::orchestrator::PipelineOrchestrator;
use crate::pipeline::engines::TopRatedRanker;
use crate::pipeline::error::PipelineError;
use crate::pipeline::stages::{
    AcquireStage, CleanupStage, ShowOutputStage, StagingStage, TransformationsStage,
};
use crate::sources::{DatasetAcquirer, HttpDatasetAcquirer};
use crate::storage::{StorageBridge, create_storage_bridge};

/// Builder for constructing pipeline orchestrators from configuration
pub struct PipelineBuilder {
    config: Arc<EtlConfig>,
    table_store: Option<Arc<dyn TableStore>>,
    storage_bridge: Option<Arc<dyn StorageBridge>>,
    acquirer: Option<Arc<dyn DatasetAcquirer>>,
}

impl PipelineBuilder {
    pub fn new(config: Arc<EtlConfig>) -> Self {
        Self {
            config,
            table_store: None,
            storage_bridge: None,
            acquirer: None,
        }
    }

    pub fn with_table_store(mut self, store: Arc<dyn TableStore>) -> Self {
        self.table_store = Some(store);
        self
    }

    /// Defaults to the `[storage] backend` bridge
    pub fn with_storage_bridge(mut self, bridge: Arc<dyn StorageBridge>) -> Self {
        self.storage_bridge = Some(bridge);
        self
    }

    /// Defaults to an HTTP acquirer built from `[download]`
    pub fn with_acquirer(mut self, acquirer: Arc<dyn DatasetAcquirer>) -> Self {
        self.acquirer = Some(acquirer);
        self
    }

    pub fn build(self) -> Result<PipelineOrchestrator, PipelineError> {
        let config = self.config;
        let store = self
            .table_store
            .ok_or_else(|| PipelineError::config_error("a table store is required"))?;
        let bridge = self
            .storage_bridge
            .unwrap_or_else(|| create_storage_bridge(&config.storage));
        let acquirer: Arc<dyn DatasetAcquirer> = match self.acquirer {
            Some(acquirer) => acquirer,
            None => Arc::new(
                HttpDatasetAcquirer::new(&config.download)
                    .map_err(|e| PipelineError::config_error(e.to_string()))?,
            ),
        };

        let tables = PipelineTables::from_config(&config.database_tables)
            .map_err(|e| PipelineError::config_error(e.to_string()))?;
        let dataset_name = config.directory.dataset_name().ok_or_else(|| {
            PipelineError::config_error(format!(
                "zip_name '{}' has no file stem",
                config.directory.zip_name
            ))
        })?;
        let local_dataset_dir = config.directory.datasets_dir.join(&dataset_name);
        let remote_dataset_path = config.storage.remote_path(&dataset_name);
        let controls = config.controls;

        debug!(
            "Building pipeline: dataset={} remote={} controls={:?}",
            dataset_name, remote_dataset_path, controls
        );

        let mut orchestrator = PipelineOrchestrator::new();
        orchestrator.add_stage(
            Box::new(AcquireStage::new(
                acquirer,
                config.dataset.dataset_url.clone(),
                config.directory.datasets_dir.clone(),
                config.directory.zip_name.clone(),
            )),
            controls.download_data,
        );
        orchestrator.add_stage(
            Box::new(StagingStage::new(
                bridge.clone(),
                store.clone(),
                tables.clone(),
                local_dataset_dir,
                remote_dataset_path.clone(),
            )),
            controls.staging_flag,
        );
        orchestrator.add_stage(
            Box::new(TransformationsStage::new(
                store.clone(),
                tables.clone(),
                TopRatedRanker::new(config.ranking.min_evidence, config.ranking.top_n),
                PartitionedCsvWriter::new(config.export.max_records_per_partition),
                config.directory.output_file_dir.clone(),
                config.ranking.output_name.clone(),
            )),
            controls.transformations_flag,
        );
        orchestrator.add_stage(
            Box::new(ShowOutputStage::new(
                store,
                tables.exploded_movies,
                config.directory.output_file_dir.clone(),
                config.ranking.output_name.clone(),
            )),
            controls.show_output_flag,
        );

        let mut cleanup_paths = vec![remote_dataset_path];
        cleanup_paths.extend(config.storage.cleanup_paths.iter().cloned());
        orchestrator.set_cleanup_stage(Box::new(CleanupStage::new(bridge, cleanup_paths)));

        Ok(orchestrator)
    }
}
