//! Pipeline infrastructure
//!
//! - **Core**: stage sequencing, failure classification and assembly from config
//! - **Engines**: the genre explode and the top-rated ranking
//! - **Models**: execution tracking
//! - **Stages**: acquire, staging, transformations, show output, cleanup

pub mod core;
pub mod engines;
pub mod error;
pub mod models;
pub mod stages;
pub mod traits;

// Re-export key types for easier access
pub use core::{PipelineBuilder, PipelineOrchestrator};
pub use engines::{GenreExploder, RankingOutcome, TopRatedRanker};
pub use error::{FailureDisposition, PipelineError};
pub use models::{PipelineExecution, PipelineStageExecution, PipelineStatus, StageStatus};
pub use stages::stage_ids;
pub use traits::{PipelineStage, StageMetrics};
