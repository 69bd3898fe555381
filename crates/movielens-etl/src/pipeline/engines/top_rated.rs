//! Evidence-filtered top-N ranking over the ratings stream.
//!
//! Ratings are grouped per movie, movies with fewer than `min_evidence`
//! observations are discarded, the rest are ordered by mean rating and the
//! first `top_n` are resolved to titles through the catalog.

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::defaults::{DEFAULT_MIN_EVIDENCE, DEFAULT_TOP_N};
use crate::models::{MovieRatingAggregate, MovieRecord, RatingRecord, TopRatedEntry};

/// Result of a ranking run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingOutcome {
    /// Ranked titles, best first
    pub entries: Vec<TopRatedEntry>,
    /// Aggregates behind `entries`, in the same order
    pub ranked: Vec<MovieRatingAggregate>,
    /// Movies that made the cut but have no catalog row
    pub unresolved: Vec<i64>,
    /// Movies that cleared the evidence filter
    pub qualified: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TopRatedRanker {
    min_evidence: u32,
    top_n: usize,
}

impl Default for TopRatedRanker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_EVIDENCE, DEFAULT_TOP_N)
    }
}

impl TopRatedRanker {
    /// `min_evidence` below 1 is treated as 1
    pub fn new(min_evidence: u32, top_n: usize) -> Self {
        Self {
            min_evidence: min_evidence.max(1),
            top_n,
        }
    }

    pub fn min_evidence(&self) -> u32 {
        self.min_evidence
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Mean and count per movie over every rating row, ordered by movie id
    pub fn aggregate(ratings: &[RatingRecord]) -> Vec<MovieRatingAggregate> {
        let mut totals: HashMap<i64, (f64, u64)> = HashMap::new();
        for rating in ratings {
            let entry = totals.entry(rating.movie_id).or_insert((0.0, 0));
            entry.0 += rating.rating;
            entry.1 += 1;
        }

        let mut aggregates: Vec<MovieRatingAggregate> = totals
            .into_iter()
            .map(|(movie_id, (sum, count))| MovieRatingAggregate {
                movie_id,
                mean_rating: sum / count as f64,
                rating_count: count,
            })
            .collect();
        aggregates.sort_by_key(|aggregate| aggregate.movie_id);
        aggregates
    }

    /// Mean descending, then count descending, then movie id ascending
    fn ranking_order(a: &MovieRatingAggregate, b: &MovieRatingAggregate) -> Ordering {
        b.mean_rating
            .total_cmp(&a.mean_rating)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    }

    pub fn rank(&self, movies: &[MovieRecord], ratings: &[RatingRecord]) -> RankingOutcome {
        debug!(
            "Ranking {} ratings across {} movies: min_evidence={} top_n={}",
            ratings.len(),
            movies.len(),
            self.min_evidence,
            self.top_n
        );

        if movies.is_empty() || ratings.is_empty() {
            debug!("Empty movies or ratings input, nothing to rank");
            return RankingOutcome::default();
        }

        let mut qualified: Vec<MovieRatingAggregate> = Self::aggregate(ratings)
            .into_iter()
            .filter(|aggregate| aggregate.rating_count >= u64::from(self.min_evidence))
            .collect();
        let qualified_count = qualified.len();

        qualified.sort_by(Self::ranking_order);
        qualified.truncate(self.top_n);

        let mut titles: HashMap<i64, &str> = HashMap::with_capacity(movies.len());
        for movie in movies {
            titles.entry(movie.movie_id).or_insert(movie.title.as_str());
        }

        let mut outcome = RankingOutcome {
            qualified: qualified_count,
            ..RankingOutcome::default()
        };

        for aggregate in qualified {
            match titles.get(&aggregate.movie_id) {
                Some(title) => {
                    debug!(
                        "Ranked movie_id={} mean={:.3} count={} title={}",
                        aggregate.movie_id, aggregate.mean_rating, aggregate.rating_count, title
                    );
                    outcome.entries.push(TopRatedEntry {
                        title: (*title).to_string(),
                    });
                    outcome.ranked.push(aggregate);
                }
                None => {
                    warn!(
                        "Data quality: rated movie_id={} has no catalog entry, excluding it from the ranking",
                        aggregate.movie_id
                    );
                    outcome.unresolved.push(aggregate.movie_id);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(movie_id: i64, title: &str) -> MovieRecord {
        MovieRecord {
            movie_id,
            title: title.to_string(),
            genres: "drama".to_string(),
        }
    }

    fn rating(user_id: i64, movie_id: i64, rating: f64) -> RatingRecord {
        RatingRecord {
            user_id,
            movie_id,
            rating,
            timestamp: "964982703".to_string(),
        }
    }

    fn titles(outcome: &RankingOutcome) -> Vec<&str> {
        outcome.entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_evidence_filter_excludes_sparse_movies() {
        let movies = vec![
            movie(1, "alpha"),
            movie(2, "beta"),
            movie(4, "alpha"),
            movie(3, "delta"),
        ];
        let ratings = vec![
            rating(1, 1, 4.5),
            rating(1, 2, 4.0),
            rating(2, 1, 3.0),
            rating(3, 1, 4.5),
            rating(4, 1, 4.5),
            rating(5, 1, 4.5),
            rating(2, 2, 4.5),
            rating(1, 1, 4.5),
            rating(7, 1, 4.5),
        ];

        let outcome = TopRatedRanker::new(3, 10).rank(&movies, &ratings);

        assert_eq!(titles(&outcome), vec!["alpha"]);
        assert_eq!(outcome.qualified, 1);
        assert_eq!(outcome.ranked[0].movie_id, 1);
        assert_eq!(outcome.ranked[0].rating_count, 7);
    }

    #[test]
    fn test_high_mean_with_little_evidence_never_ranks() {
        let movies = vec![movie(1, "steady"), movie(2, "lucky")];
        let ratings = vec![
            rating(1, 1, 3.5),
            rating(2, 1, 3.5),
            rating(3, 1, 3.5),
            rating(1, 2, 5.0),
            rating(2, 2, 5.0),
        ];

        let outcome = TopRatedRanker::new(3, 10).rank(&movies, &ratings);

        assert_eq!(titles(&outcome), vec!["steady"]);
    }

    #[test]
    fn test_duplicate_observations_count_as_evidence() {
        let movies = vec![movie(1, "alpha")];
        let ratings = vec![rating(1, 1, 4.0), rating(1, 1, 4.0), rating(1, 1, 5.0)];

        let aggregates = TopRatedRanker::aggregate(&ratings);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].rating_count, 3);
        assert!((aggregates[0].mean_rating - 13.0 / 3.0).abs() < 1e-9);

        let outcome = TopRatedRanker::new(3, 10).rank(&movies, &ratings);
        assert_eq!(titles(&outcome), vec!["alpha"]);
    }

    #[test]
    fn test_result_is_bounded_by_top_n() {
        let movies: Vec<MovieRecord> = (1..=20).map(|id| movie(id, &format!("m{id}"))).collect();
        let ratings: Vec<RatingRecord> = (1..=20)
            .flat_map(|id| (1..=3).map(move |user| rating(user, id, (id % 5) as f64)))
            .collect();

        let outcome = TopRatedRanker::new(3, 5).rank(&movies, &ratings);

        assert_eq!(outcome.qualified, 20);
        assert_eq!(outcome.entries.len(), 5);
        assert!(
            outcome
                .ranked
                .windows(2)
                .all(|pair| pair[0].mean_rating >= pair[1].mean_rating)
        );
    }

    #[test]
    fn test_ties_break_on_count_then_movie_id() {
        let movies = vec![movie(10, "ten"), movie(11, "eleven"), movie(12, "twelve")];
        let mut ratings = Vec::new();
        for user in 1..=3 {
            ratings.push(rating(user, 12, 4.0));
            ratings.push(rating(user, 10, 4.0));
        }
        for user in 1..=4 {
            ratings.push(rating(user, 11, 4.0));
        }

        let ranker = TopRatedRanker::new(3, 10);
        let first = ranker.rank(&movies, &ratings);

        assert_eq!(titles(&first), vec!["eleven", "ten", "twelve"]);

        ratings.reverse();
        let second = ranker.rank(&movies, &ratings);
        assert_eq!(first.entries, second.entries);
    }

    #[test]
    fn test_missing_catalog_entry_is_skipped_not_fatal() {
        let movies = vec![movie(1, "alpha")];
        let ratings = vec![
            rating(1, 1, 4.0),
            rating(2, 1, 4.0),
            rating(3, 1, 4.0),
            rating(1, 99, 5.0),
            rating(2, 99, 5.0),
            rating(3, 99, 5.0),
        ];

        let outcome = TopRatedRanker::new(3, 10).rank(&movies, &ratings);

        assert_eq!(titles(&outcome), vec!["alpha"]);
        assert_eq!(outcome.unresolved, vec![99]);
    }

    #[test]
    fn test_empty_inputs_produce_empty_result() {
        let movies = vec![movie(1, "alpha")];
        let ratings = vec![rating(1, 1, 4.0)];
        let ranker = TopRatedRanker::default();

        assert_eq!(ranker.rank(&[], &ratings), RankingOutcome::default());
        assert_eq!(ranker.rank(&movies, &[]), RankingOutcome::default());
    }

    #[test]
    fn test_zero_min_evidence_is_clamped() {
        assert_eq!(TopRatedRanker::new(0, 10).min_evidence(), 1);
    }
}
