pub mod pipeline_execution;

pub use pipeline_execution::{PipelineExecution, PipelineStageExecution, PipelineStatus, StageStatus};
