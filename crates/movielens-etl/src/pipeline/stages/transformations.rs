//! Genre explode and top-rated export

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::stage_ids;
use crate::database::TableStore;
use crate::database::table_store::PipelineTables;
use crate::output::{OutputFinalizer, PartitionedCsvWriter, write_top_rated};
use crate::pipeline::engines::{GenreExploder, TopRatedRanker};
use crate::pipeline::error::PipelineError;
use crate::pipeline::traits::{PipelineStage, StageMetrics};
use crate::utils::human_format::format_duration_precise;

pub struct TransformationsStage {
    store: Arc<dyn TableStore>,
    tables: PipelineTables,
    exploder: GenreExploder,
    ranker: TopRatedRanker,
    writer: PartitionedCsvWriter,
    finalizer: OutputFinalizer,
    output_dir: PathBuf,
    output_name: String,
}

impl TransformationsStage {
    pub fn new(
        store: Arc<dyn TableStore>,
        tables: PipelineTables,
        ranker: TopRatedRanker,
        writer: PartitionedCsvWriter,
        output_dir: PathBuf,
        output_name: String,
    ) -> Self {
        Self {
            store,
            tables,
            exploder: GenreExploder::new(),
            ranker,
            writer,
            finalizer: OutputFinalizer::new(),
            output_dir,
            output_name,
        }
    }
}

#[async_trait]
impl PipelineStage for TransformationsStage {
    fn stage_id(&self) -> &'static str {
        stage_ids::TRANSFORMATIONS
    }

    fn stage_name(&self) -> &'static str {
        "Transformations"
    }

    async fn execute(&mut self) -> Result<StageMetrics, PipelineError> {
        let started = Instant::now();

        let movies = self
            .store
            .read_movies(&self.tables.movies)
            .await
            .map_err(|e| PipelineError::transformation("reading movies", e))?;

        let exploded = self.exploder.explode(&movies);
        let exploded_rows = self
            .store
            .overwrite_exploded(&self.tables.exploded_movies, &exploded)
            .await
            .map_err(|e| PipelineError::transformation("writing exploded movies", e))?;
        info!(
            "Genres exploded: movies={} rows={} table={}",
            movies.len(),
            exploded_rows,
            self.tables.exploded_movies
        );

        let ratings = self
            .store
            .read_ratings(&self.tables.ratings)
            .await
            .map_err(|e| PipelineError::transformation("reading ratings", e))?;

        let outcome = self.ranker.rank(&movies, &ratings);
        if !outcome.unresolved.is_empty() {
            warn!(
                "{} ranked movies have no catalog title: {:?}",
                outcome.unresolved.len(),
                outcome.unresolved
            );
        }
        debug!(
            "Ranking: qualified={} ranked={} entries={}",
            outcome.qualified,
            outcome.ranked.len(),
            outcome.entries.len()
        );

        let top_rated = outcome.entries.len();
        let export = write_top_rated(
            self.writer.clone(),
            self.finalizer,
            self.output_dir.clone(),
            self.output_name.clone(),
            outcome.entries,
        )
        .await
        .map_err(|e| PipelineError::transformation("exporting top-rated titles", e))?;

        info!(
            "Transformations completed: top_rated={} partitions={} file={:?} duration={}",
            top_rated,
            export.summary.partitions.len(),
            export.finalized,
            format_duration_precise(started.elapsed())
        );

        let mut metrics = StageMetrics::new();
        metrics.insert("exploded_rows".to_string(), serde_json::json!(exploded_rows));
        metrics.insert("qualified_movies".to_string(), serde_json::json!(outcome.qualified));
        metrics.insert("top_rated".to_string(), serde_json::json!(top_rated));
        metrics.insert("unresolved_titles".to_string(), serde_json::json!(outcome.unresolved));
        metrics.insert(
            "output_file".to_string(),
            serde_json::json!(export.finalized.map(|p| p.to_string_lossy().into_owned())),
        );
        Ok(metrics)
    }
}
