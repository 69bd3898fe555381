//! Genre explode: one catalog row per (movie, genre) pair.

use tracing::debug;

use crate::models::{ExplodedGenreRecord, MovieRecord};

/// Separator used by the MovieLens `genres` column
pub const GENRE_DELIMITER: char = '|';

/// Normalizes the multi-valued `genres` field into one row per token.
///
/// Tokens are trimmed and empty tokens are dropped, so an empty or
/// delimiter-only field yields no rows. Repeated tokens are kept as repeated
/// rows.
#[derive(Debug, Clone, Copy)]
pub struct GenreExploder {
    delimiter: char,
}

impl Default for GenreExploder {
    fn default() -> Self {
        Self::new()
    }
}

impl GenreExploder {
    pub fn new() -> Self {
        Self {
            delimiter: GENRE_DELIMITER,
        }
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Non-empty genre tokens of a single `genres` value
    pub fn tokens<'a>(&self, genres: &'a str) -> impl Iterator<Item = &'a str> + use<'a> {
        genres
            .split(self.delimiter)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn explode(&self, movies: &[MovieRecord]) -> Vec<ExplodedGenreRecord> {
        debug!("Exploding genres for {} movies", movies.len());

        let exploded: Vec<ExplodedGenreRecord> = movies
            .iter()
            .flat_map(|movie| {
                self.tokens(&movie.genres).map(move |genre| ExplodedGenreRecord {
                    movie_id: movie.movie_id,
                    title: movie.title.clone(),
                    genre: genre.to_string(),
                })
            })
            .collect();

        debug!(
            "Genre explode produced {} rows from {} movies",
            exploded.len(),
            movies.len()
        );
        exploded
    }
}
