use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod serde_helpers;

use defaults::*;

/// Full pipeline configuration, loaded once per run and never mutated.
///
/// The first four sections are the pipeline parameters proper; the rest are
/// optional and fall back to [`defaults`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub dataset: DatasetConfig,
    pub database_tables: DatabaseTablesConfig,
    pub directory: DirectoryConfig,
    pub controls: ControlsConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseTablesConfig {
    pub database_name: String,
    pub movies_table_name: String,
    pub tags_table_name: String,
    pub ratings_table_name: String,
    pub ratings_update_table_name: String,
    pub exploded_movies_table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Archive file name; its stem names the extracted dataset directory
    pub zip_name: String,
    pub datasets_dir: PathBuf,
    pub output_file_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlsConfig {
    #[serde(with = "serde_helpers::flag")]
    pub download_data: bool,
    #[serde(with = "serde_helpers::flag")]
    pub staging_flag: bool,
    #[serde(with = "serde_helpers::flag")]
    pub transformations_flag: bool,
    #[serde(with = "serde_helpers::flag")]
    pub show_output_flag: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_min_evidence")]
    pub min_evidence: u32,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Base name of the finalized export file
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_warehouse_url")]
    pub url: String,
    /// Where attached per-database SQLite files live. `None` keeps them in memory.
    #[serde(default = "default_warehouse_dir")]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Durable storage root the dataset is staged under
    #[serde(default = "default_remote_root")]
    pub remote_root: String,
    /// CLI used by the `command` backend
    #[serde(default = "default_storage_command")]
    pub command: String,
    #[serde(default = "default_command_timeout", with = "serde_helpers::duration")]
    pub command_timeout: Duration,
    /// Extra durable paths removed during cleanup
    #[serde(default)]
    pub cleanup_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_timeout", with = "serde_helpers::duration")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// 0 writes a single partition
    #[serde(default = "default_max_records_per_partition")]
    pub max_records_per_partition: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_stream_output", with = "serde_helpers::flag")]
    pub stream_output: bool,
}

fn default_min_evidence() -> u32 {
    DEFAULT_MIN_EVIDENCE
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}

fn default_warehouse_url() -> String {
    DEFAULT_WAREHOUSE_URL.to_string()
}

fn default_warehouse_dir() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_WAREHOUSE_DIR))
}

fn default_remote_root() -> String {
    DEFAULT_REMOTE_ROOT.to_string()
}

fn default_storage_command() -> String {
    DEFAULT_STORAGE_COMMAND.to_string()
}

fn default_command_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_STORAGE_COMMAND_TIMEOUT).unwrap_or(Duration::from_secs(600))
}

fn default_download_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_DOWNLOAD_TIMEOUT).unwrap_or(Duration::from_secs(600))
}

fn default_user_agent() -> String {
    format!("{}/{}", DEFAULT_USER_AGENT, env!("CARGO_PKG_VERSION"))
}

fn default_max_records_per_partition() -> usize {
    DEFAULT_MAX_RECORDS_PER_PARTITION
}

fn default_log_file_prefix() -> String {
    DEFAULT_LOG_FILE_PREFIX.to_string()
}

fn default_stream_output() -> bool {
    DEFAULT_STREAM_OUTPUT
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_evidence: default_min_evidence(),
            top_n: default_top_n(),
            output_name: default_output_name(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: default_warehouse_url(),
            directory: default_warehouse_dir(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            remote_root: default_remote_root(),
            command: default_storage_command(),
            command_timeout: default_command_timeout(),
            cleanup_paths: Vec::new(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_records_per_partition: default_max_records_per_partition(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_log_file_prefix(),
            stream_output: default_stream_output(),
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Whether `name` is safe to interpolate into SQL as a database or table name
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

fn output_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("output name pattern is a valid regex")
    })
}

/// Whether `name` can be the base of a finalized export file. It must be a
/// plain file name that the finalizer will not mistake for a marker or a
/// partition.
pub fn is_valid_output_name(name: &str) -> bool {
    output_name_pattern().is_match(name) && !name.starts_with(crate::output::PARTITION_PREFIX)
}

impl DatabaseTablesConfig {
    fn identifiers(&self) -> [(&'static str, &str); 6] {
        [
            ("database_name", &self.database_name),
            ("movies_table_name", &self.movies_table_name),
            ("tags_table_name", &self.tags_table_name),
            ("ratings_table_name", &self.ratings_table_name),
            ("ratings_update_table_name", &self.ratings_update_table_name),
            ("exploded_movies_table_name", &self.exploded_movies_table_name),
        ]
    }
}

impl DirectoryConfig {
    /// Name of the directory the archive extracts into (`ml-latest-small.zip` -> `ml-latest-small`)
    pub fn dataset_name(&self) -> Option<String> {
        Path::new(&self.zip_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }

    pub fn zip_path(&self) -> PathBuf {
        self.datasets_dir.join(&self.zip_name)
    }
}

impl StorageConfig {
    /// Durable location of a staged dataset directory
    pub fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.remote_root.trim_end_matches('/'), name)
    }
}

impl EtlConfig {
    /// Load from `config_file`, layered with `MOVIELENS_ETL_` environment
    /// overrides (`MOVIELENS_ETL_CONTROLS__DOWNLOAD_DATA=false`).
    pub fn load_from_file(config_file: impl AsRef<Path>) -> AppResult<Self> {
        let config_file = config_file.as_ref();
        debug!("Loading configuration from {:?}", config_file);

        if !config_file.exists() {
            return Err(AppError::configuration(format!(
                "Config file not found: {}",
                config_file.display()
            )));
        }

        let config: Self = Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;

        config.validate()?;
        info!(
            "Configuration loaded: database={} controls={:?}",
            config.database_tables.database_name, config.controls
        );
        Ok(config)
    }

    /// Parse a TOML document directly, without environment overrides
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(contents))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        for (key, value) in self.database_tables.identifiers() {
            if !is_valid_identifier(value) {
                return Err(AppError::configuration(format!(
                    "{key} '{value}' is not a valid identifier"
                )));
            }
        }

        if self.directory.dataset_name().is_none() {
            return Err(AppError::configuration(format!(
                "zip_name '{}' has no file stem",
                self.directory.zip_name
            )));
        }

        if self.ranking.min_evidence < 1 {
            return Err(AppError::configuration(
                "ranking.min_evidence must be at least 1",
            ));
        }

        if !is_valid_output_name(&self.ranking.output_name) {
            return Err(AppError::configuration(format!(
                "ranking.output_name '{}' must be a plain file name not starting with '_' or '{}'",
                self.ranking.output_name,
                crate::output::PARTITION_PREFIX
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) const SAMPLE_CONFIG: &str = r#"
[dataset]
dataset_url = "https://files.grouplens.org/datasets/movielens/ml-latest-small.zip"

[database_tables]
database_name = "movies_data"
movies_table_name = "movies"
tags_table_name = "tags"
ratings_table_name = "ratings"
ratings_update_table_name = "ratings_update"
exploded_movies_table_name = "exploded_movies"

[directory]
zip_name = "ml-latest-small.zip"
datasets_dir = "/tmp/datasets"
output_file_dir = "/tmp/output/top_10"

[controls]
download_data = "True"
staging_flag = "false"
transformations_flag = true
show_output_flag = "FALSE"
"#;

    #[test]
    fn test_sample_config_parses_string_and_bool_flags() {
        let config = EtlConfig::from_toml_str(SAMPLE_CONFIG).unwrap();

        assert!(config.controls.download_data);
        assert!(!config.controls.staging_flag);
        assert!(config.controls.transformations_flag);
        assert!(!config.controls.show_output_flag);
        assert_eq!(config.database_tables.database_name, "movies_data");
    }

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let config = EtlConfig::from_toml_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.ranking.min_evidence, DEFAULT_MIN_EVIDENCE);
        assert_eq!(config.ranking.top_n, DEFAULT_TOP_N);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.export.max_records_per_partition, 0);
        assert_eq!(config.download.timeout, Duration::from_secs(600));
        assert!(config.logging.stream_output);
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let contents = SAMPLE_CONFIG.replace(r#"staging_flag = "false""#, r#"staging_flag = "nope""#);
        let err = EtlConfig::from_toml_str(&contents).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_invalid_table_identifier_is_rejected() {
        let contents = SAMPLE_CONFIG.replace(
            r#"movies_table_name = "movies""#,
            r#"movies_table_name = "movies; DROP TABLE ratings""#,
        );
        let err = EtlConfig::from_toml_str(&contents).unwrap_err();
        assert!(err.to_string().contains("movies_table_name"));
    }

    #[test]
    fn test_zero_min_evidence_is_rejected() {
        let contents = format!("{SAMPLE_CONFIG}\n[ranking]\nmin_evidence = 0\n");
        assert!(EtlConfig::from_toml_str(&contents).is_err());
    }

    #[rstest]
    #[case("top_movies", true)]
    #[case("top-10.v2", true)]
    #[case("", false)]
    #[case("_top_movies", false)]
    #[case("part-00000", false)]
    #[case("reports/top_movies", false)]
    #[case("..", false)]
    #[case("top movies", false)]
    fn test_output_name_validation(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(is_valid_output_name(name), valid);

        let contents = format!("{SAMPLE_CONFIG}\n[ranking]\noutput_name = {name:?}\n");
        assert_eq!(EtlConfig::from_toml_str(&contents).is_ok(), valid);
    }

    #[test]
    fn test_dataset_name_and_remote_path() {
        let config = EtlConfig::from_toml_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.directory.dataset_name().as_deref(), Some("ml-latest-small"));
        assert_eq!(
            config.directory.zip_path(),
            PathBuf::from("/tmp/datasets/ml-latest-small.zip")
        );

        let storage = StorageConfig {
            remote_root: "dbfs:/staging/".to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(storage.remote_path("ml-latest-small"), "dbfs:/staging/ml-latest-small");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = EtlConfig::from_toml_str(include_str!("../../../../config.toml")).unwrap();

        assert!(config.controls.download_data);
        assert_eq!(config.storage.command_timeout, Duration::from_secs(600));
        assert_eq!(config.logging.directory, Some(PathBuf::from("./data/logs")));
    }

    #[test]
    fn test_environment_overrides_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE_CONFIG)?;
            jail.set_env("MOVIELENS_ETL_CONTROLS__DOWNLOAD_DATA", "false");
            jail.set_env("MOVIELENS_ETL_RANKING__TOP_N", "5");

            let config = EtlConfig::load_from_file("config.toml").map_err(|e| e.to_string())?;

            assert!(!config.controls.download_data);
            assert_eq!(config.ranking.top_n, 5);
            // untouched keys still come from the file
            assert!(config.controls.transformations_flag);
            assert_eq!(config.database_tables.database_name, "movies_data");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_environment_override_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE_CONFIG)?;
            jail.set_env("MOVIELENS_ETL_CONTROLS__STAGING_FLAG", "sometimes");

            let err = EtlConfig::load_from_file("config.toml").unwrap_err();
            assert!(err.to_string().contains("sometimes"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = EtlConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
