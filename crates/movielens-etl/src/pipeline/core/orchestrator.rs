//! Pipeline Orchestrator
//!
//! Runs the enabled stages strictly in sequence:
//! `Init -> Acquire -> Upload -> Transform -> Export -> Cleanup -> Done`.
//! A stage failure is classified by [`PipelineError::disposition`]; an abort
//! ends the run immediately and skips cleanup.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::pipeline::error::{FailureDisposition, PipelineError};
use crate::pipeline::models::{PipelineExecution, PipelineStatus, StageStatus};
use crate::pipeline::stages::stage_ids;
use crate::pipeline::traits::PipelineStage;
use crate::utils::human_format::format_duration_precise;

struct ScheduledStage {
    stage: Box<dyn PipelineStage>,
    enabled: bool,
}

pub struct PipelineOrchestrator {
    execution: PipelineExecution,
    stages: Vec<ScheduledStage>,
    cleanup: Option<Box<dyn PipelineStage>>,
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self {
            execution: PipelineExecution::new(),
            stages: Vec::new(),
            cleanup: None,
        }
    }

    /// Add a stage to the pipeline. Disabled stages are recorded as skipped.
    pub fn add_stage(&mut self, stage: Box<dyn PipelineStage>, enabled: bool) {
        self.execution.add_stage(stage.stage_id(), stage.stage_name());
        self.stages.push(ScheduledStage { stage, enabled });
    }

    /// Stage run after every non-aborted pass; its failures are swallowed
    pub fn set_cleanup_stage(&mut self, stage: Box<dyn PipelineStage>) {
        self.execution.add_stage(stage.stage_id(), stage.stage_name());
        self.cleanup = Some(stage);
    }

    pub fn get_execution_id(&self) -> uuid::Uuid {
        self.execution.id
    }

    /// Execute the entire pipeline and return its execution record
    pub async fn execute_pipeline(&mut self) -> PipelineExecution {
        let pipeline_start = Instant::now();
        info!("Starting pipeline execution: {}", self.execution.id);

        let total_stages = self.stages.len();
        for stage_index in 0..total_stages {
            let scheduled = &mut self.stages[stage_index];
            let stage_id = scheduled.stage.stage_id();
            let stage_name = scheduled.stage.stage_name();

            if !scheduled.enabled {
                debug!("Skipping disabled stage {}", stage_id);
                self.execution.skip_stage(stage_id);
                continue;
            }

            info!(
                "Executing stage {}/{}: {} ({})",
                stage_index + 1,
                total_stages,
                stage_name,
                stage_id
            );
            self.execution.status = get_pipeline_status_for_stage(stage_id);
            self.execution.start_stage(stage_id);

            let stage_start = Instant::now();
            match scheduled.stage.execute().await {
                Ok(metrics) => {
                    info!(
                        "Stage {} completed in {}",
                        stage_name,
                        format_duration_precise(stage_start.elapsed())
                    );
                    self.execution.complete_stage(stage_id, metrics);
                }
                Err(e) => {
                    self.execution.fail_stage(stage_id, e.to_string());
                    match e.disposition() {
                        FailureDisposition::Abort => {
                            error!("Stage {} failed, aborting run: {}", stage_name, e);
                            return self.abort(e, pipeline_start);
                        }
                        FailureDisposition::FallbackToStaged => {
                            if scheduled.stage.has_fallback().await {
                                warn!(
                                    "Stage {} failed, continuing with previously staged data: {}",
                                    stage_name, e
                                );
                            } else {
                                error!(
                                    "Stage {} failed and no staged data exists, aborting run: {}",
                                    stage_name, e
                                );
                                return self.abort(e, pipeline_start);
                            }
                        }
                        FailureDisposition::Continue => {
                            warn!("Stage {} failed, continuing: {}", stage_name, e);
                        }
                    }
                }
            }
        }

        self.run_cleanup().await;

        self.execution.complete();
        info!(
            "Pipeline execution completed: {} stages run, duration: {}",
            self.execution.executed_stages().len(),
            format_duration_precise(pipeline_start.elapsed())
        );
        self.log_summary();
        self.execution.clone()
    }

    async fn run_cleanup(&mut self) {
        let Some(stage) = self.cleanup.as_mut() else {
            return;
        };
        let stage_id = stage.stage_id();

        self.execution.status = PipelineStatus::CleaningUp;
        self.execution.start_stage(stage_id);
        match stage.execute().await {
            Ok(metrics) => self.execution.complete_stage(stage_id, metrics),
            Err(e) => {
                error!("Cleanup failed (ignored): {}", e);
                self.execution.fail_stage(stage_id, e.to_string());
            }
        }
    }

    fn abort(&mut self, error: PipelineError, pipeline_start: Instant) -> PipelineExecution {
        if let Some(cleanup) = &self.cleanup {
            self.execution.skip_stage(cleanup.stage_id());
        }
        for scheduled in &self.stages {
            let stage_id = scheduled.stage.stage_id();
            if matches!(
                self.execution.stage(stage_id).map(|s| s.status),
                Some(StageStatus::Pending)
            ) {
                self.execution.skip_stage(stage_id);
            }
        }

        self.execution.abort(error.to_string());
        error!(
            "Pipeline execution aborted after {}: {}",
            format_duration_precise(pipeline_start.elapsed()),
            error
        );
        self.log_summary();
        self.execution.clone()
    }

    fn log_summary(&self) {
        info!(
            "Pipeline {} finished with status {}",
            self.execution.id, self.execution.status
        );
        for stage in &self.execution.stages {
            match &stage.error_message {
                Some(message) => info!("  {:<16} {:<10} {}", stage.id, stage.status, message),
                None => info!("  {:<16} {}", stage.id, stage.status),
            }
        }
    }
}

/// Get the appropriate PipelineStatus for a given stage ID
fn get_pipeline_status_for_stage(stage_id: &str) -> PipelineStatus {
    match stage_id {
        stage_ids::ACQUIRE => PipelineStatus::Acquiring,
        stage_ids::STAGING => PipelineStatus::Uploading,
        stage_ids::TRANSFORMATIONS => PipelineStatus::Transforming,
        stage_ids::SHOW_OUTPUT => PipelineStatus::Exporting,
        stage_ids::CLEANUP => PipelineStatus::CleaningUp,
        _ => PipelineStatus::Initializing,
    }
}
