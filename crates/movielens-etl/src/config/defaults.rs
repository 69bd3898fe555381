/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.

// Loader defaults
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "MOVIELENS_ETL_";

// Ranking defaults
/// Smallest rating count a movie needs before its mean rating is trusted.
pub const DEFAULT_MIN_EVIDENCE: u32 = 3;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_OUTPUT_NAME: &str = "top_movies";

// Warehouse defaults
pub const DEFAULT_WAREHOUSE_URL: &str = "sqlite://./data/warehouse.db?mode=rwc";
pub const DEFAULT_WAREHOUSE_DIR: &str = "./data/warehouse";

// Storage bridge defaults
pub const DEFAULT_REMOTE_ROOT: &str = "./data/remote";
pub const DEFAULT_STORAGE_COMMAND: &str = "dbfs";
pub const DEFAULT_STORAGE_COMMAND_TIMEOUT: &str = "10m";

// Download defaults
pub const DEFAULT_DOWNLOAD_TIMEOUT: &str = "10m";
pub const DEFAULT_USER_AGENT: &str = "movielens-etl";

// Export defaults
pub const DEFAULT_MAX_RECORDS_PER_PARTITION: usize = 0;

// Logging defaults
pub const DEFAULT_LOG_FILE_PREFIX: &str = "movielens-etl";
pub const DEFAULT_STREAM_OUTPUT: bool = true;
