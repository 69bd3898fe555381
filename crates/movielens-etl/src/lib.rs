//! MovieLens batch ETL
//!
//! Downloads the MovieLens dataset, stages it on durable storage and in a
//! SQLite warehouse, explodes movie genres into their own table and exports
//! the top-rated titles as a finalized CSV file.

pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;
