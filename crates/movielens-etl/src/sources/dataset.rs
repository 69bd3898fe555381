//! Parsing of the unpacked MovieLens CSV files

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::SourceError;
use crate::models::{MovieRecord, RatingRecord, TagRecord};

pub const MOVIES_FILE: &str = "movies.csv";
pub const RATINGS_FILE: &str = "ratings.csv";
pub const TAGS_FILE: &str = "tags.csv";

/// Everything the staging stage loads into the warehouse
#[derive(Debug, Clone, Default)]
pub struct StagedDataset {
    pub movies: Vec<MovieRecord>,
    pub ratings: Vec<RatingRecord>,
    pub tags: Vec<TagRecord>,
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
    debug!("Parsing {:?}", path);
    if !path.is_file() {
        return Err(SourceError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(csv_error)?;

    let records = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_error)?;
    debug!("Parsed {} records from {:?}", records.len(), path);
    Ok(records)
}

pub fn load_movies(dataset_dir: &Path) -> Result<Vec<MovieRecord>, SourceError> {
    read_records(&dataset_dir.join(MOVIES_FILE))
}

pub fn load_ratings(dataset_dir: &Path) -> Result<Vec<RatingRecord>, SourceError> {
    read_records(&dataset_dir.join(RATINGS_FILE))
}

pub fn load_tags(dataset_dir: &Path) -> Result<Vec<TagRecord>, SourceError> {
    read_records(&dataset_dir.join(TAGS_FILE))
}

/// Parse all three dataset files on a blocking thread
pub async fn load_dataset(dataset_dir: PathBuf) -> Result<StagedDataset, SourceError> {
    let dataset = tokio::task::spawn_blocking(move || -> Result<StagedDataset, SourceError> {
        Ok(StagedDataset {
            movies: load_movies(&dataset_dir)?,
            ratings: load_ratings(&dataset_dir)?,
            tags: load_tags(&dataset_dir)?,
        })
    })
    .await
    .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

    info!(
        "Dataset parsed: movies={} ratings={} tags={}",
        dataset.movies.len(),
        dataset.ratings.len(),
        dataset.tags.len()
    );
    Ok(dataset)
}
