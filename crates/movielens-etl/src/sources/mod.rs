//! Dataset sources
//!
//! - [`acquirer`]: fetches the MovieLens archive and unpacks it locally
//! - [`dataset`]: parses the unpacked CSV files into records

pub mod acquirer;
pub mod dataset;

pub use acquirer::{DatasetAcquirer, HttpDatasetAcquirer, extract_archive};
pub use dataset::{
    MOVIES_FILE, RATINGS_FILE, StagedDataset, TAGS_FILE, load_dataset, load_movies,
    load_ratings, load_tags,
};
