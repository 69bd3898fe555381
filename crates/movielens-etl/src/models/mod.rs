//! Record types flowing through the pipeline.
//!
//! Serde names match the MovieLens CSV headers (`movieId`, `userId`, ...) so
//! the same structs read the staged files and write the exports.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One catalog row. `genres` holds `|`-separated genre tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub title: String,
    pub genres: String,
}

/// One (movie, genre) pair produced by the genre explode
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExplodedGenreRecord {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub title: String,
    pub genre: String,
}

/// One rating observation. Repeated (user, movie) pairs are distinct rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub rating: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    pub tag: String,
    pub timestamp: String,
}

/// Per-movie rating aggregate, computed fresh each run and never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRatingAggregate {
    pub movie_id: i64,
    pub mean_rating: f64,
    pub rating_count: u64,
}

/// One row of the top-rated export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopRatedEntry {
    pub title: String,
}

impl RatingRecord {
    /// The epoch-seconds `timestamp` as an RFC 3339 UTC string, if it parses
    pub fn rated_at(&self) -> Option<String> {
        let seconds = self.timestamp.trim().parse::<i64>().ok()?;
        DateTime::<Utc>::from_timestamp(seconds, 0)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
