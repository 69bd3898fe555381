//! Process-wide tracing setup
//!
//! Console output goes through a `fmt` layer when `stream_output` is on; when
//! a log directory is configured every run also gets its own timestamped file.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::errors::{AppError, AppResult};

/// `{prefix}_{%Y%m%d%H%M%S%f}.log`
pub fn log_file_name(prefix: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}.log", prefix, at.format("%Y%m%d%H%M%S%f"))
}

/// Default filter for `--log-level`; `RUST_LOG` wins when set
pub fn default_filter(log_level: &str) -> String {
    format!("movielens_etl={log_level},warn")
}

fn open_log_file(directory: &Path, prefix: &str) -> AppResult<(PathBuf, File)> {
    fs::create_dir_all(directory)?;
    let path = directory.join(log_file_name(prefix, &Local::now()));
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Install the global subscriber. Returns the log file path, if any.
pub fn init_logging(config: &LoggingConfig, log_level: &str) -> AppResult<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(log_level).into());

    let console_layer = config
        .stream_output
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    let (log_path, file_layer) = match &config.directory {
        Some(directory) => {
            let (path, file) = open_log_file(directory, &config.file_prefix)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::configuration(format!("logging already initialised: {e}")))?;

    Ok(log_path)
}

/// Console-only logging for failures reported before the config is known.
/// Returns `false` when messages have to go to stderr instead.
pub fn init_fallback_logging(log_level: &str) -> bool {
    match init_logging(&LoggingConfig::default(), log_level) {
        Ok(_) => true,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            false
        }
    }
}
