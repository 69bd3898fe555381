//! Pipeline stages, in run order:
//! acquire, staging, transformations, show_output, cleanup.

pub mod acquire;
pub mod cleanup;
pub mod show_output;
pub mod staging;
pub mod transformations;

pub use acquire::AcquireStage;
pub use cleanup::CleanupStage;
pub use show_output::ShowOutputStage;
pub use staging::StagingStage;
pub use transformations::TransformationsStage;

/// Stage identifiers, shared by the stages and the orchestrator's status mapping
pub mod stage_ids {
    pub const ACQUIRE: &str = "acquire";
    pub const STAGING: &str = "staging";
    pub const TRANSFORMATIONS: &str = "transformations";
    pub const SHOW_OUTPUT: &str = "show_output";
    pub const CLEANUP: &str = "cleanup";
}
