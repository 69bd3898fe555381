use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::pipeline::traits::StageMetrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub id: Uuid,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// In execution order
    pub stages: Vec<PipelineStageExecution>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum PipelineStatus {
    Initializing,
    Acquiring,
    Uploading,
    Transforming,
    Exporting,
    CleaningUp,
    Completed,
    Aborted,
}

impl PipelineStatus {
    /// Process exit status for a run that ended here: 0 only for `Completed`
    pub fn exit_status(&self) -> u8 {
        match self {
            PipelineStatus::Completed => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStageExecution {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metrics: StageMetrics,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl Default for PipelineExecution {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecution {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: PipelineStatus::Initializing,
            started_at: Utc::now(),
            completed_at: None,
            stages: Vec::new(),
            error_message: None,
        }
    }

    pub fn add_stage(&mut self, stage_id: &str, stage_name: &str) {
        self.stages.push(PipelineStageExecution {
            id: stage_id.to_string(),
            name: stage_name.to_string(),
            status: StageStatus::Pending,
            started_at: None,
            completed_at: None,
            metrics: StageMetrics::new(),
            error_message: None,
        });
    }

    pub fn stage(&self, stage_id: &str) -> Option<&PipelineStageExecution> {
        self.stages.iter().find(|stage| stage.id == stage_id)
    }

    fn stage_mut(&mut self, stage_id: &str) -> Option<&mut PipelineStageExecution> {
        self.stages.iter_mut().find(|stage| stage.id == stage_id)
    }

    pub fn start_stage(&mut self, stage_id: &str) {
        if let Some(stage) = self.stage_mut(stage_id) {
            stage.status = StageStatus::Running;
            stage.started_at = Some(Utc::now());
        }
    }

    pub fn complete_stage(&mut self, stage_id: &str, metrics: StageMetrics) {
        if let Some(stage) = self.stage_mut(stage_id) {
            stage.status = StageStatus::Completed;
            stage.completed_at = Some(Utc::now());
            stage.metrics = metrics;
        }
    }

    pub fn fail_stage(&mut self, stage_id: &str, error_message: String) {
        if let Some(stage) = self.stage_mut(stage_id) {
            stage.status = StageStatus::Failed;
            stage.completed_at = Some(Utc::now());
            stage.error_message = Some(error_message);
        }
    }

    pub fn skip_stage(&mut self, stage_id: &str) {
        if let Some(stage) = self.stage_mut(stage_id) {
            stage.status = StageStatus::Skipped;
        }
    }

    pub fn complete(&mut self) {
        self.status = PipelineStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn abort(&mut self, error_message: String) {
        self.status = PipelineStatus::Aborted;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error_message);
    }

    pub fn is_completed(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Ids of stages that ran, in order
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|stage| !matches!(stage.status, StageStatus::Pending | StageStatus::Skipped))
            .map(|stage| stage.id.as_str())
            .collect()
    }
}
