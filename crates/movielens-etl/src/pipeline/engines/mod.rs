//! Transformation engines
//!
//! Pure, in-memory transformations over loaded records. Stages own the I/O;
//! engines own the semantics.

pub mod genre_exploder;
pub mod top_rated;

pub use genre_exploder::{GENRE_DELIMITER, GenreExploder};
pub use top_rated::{RankingOutcome, TopRatedRanker};
