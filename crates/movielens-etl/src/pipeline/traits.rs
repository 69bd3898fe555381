//! Pipeline Traits

use async_trait::async_trait;
use std::collections::HashMap;

use crate::pipeline::error::PipelineError;

/// Named values a stage reports on success, kept on the execution record
pub type StageMetrics = HashMap<String, serde_json::Value>;

/// Trait for pipeline stages that are executed in sequence
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Get the unique identifier for this stage
    fn stage_id(&self) -> &'static str;

    /// Get the human-readable name for this stage
    fn stage_name(&self) -> &'static str;

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError>;

    /// Whether data left by an earlier run can stand in after this stage fails
    async fn has_fallback(&self) -> bool {
        false
    }
}
