use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use movielens_etl::{
    config::{EtlConfig, defaults::DEFAULT_CONFIG_FILE},
    database::{Database, SeaOrmTableStore},
    logging::{init_fallback_logging, init_logging},
    pipeline::{PipelineBuilder, PipelineStatus},
};

#[derive(Parser)]
#[command(name = "movielens-etl")]
#[command(version)]
#[command(about = "Batch ETL over the MovieLens dataset: genre explode and top-rated export")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

async fn run(config: EtlConfig) -> Result<PipelineStatus> {
    let database = Database::connect(&config.warehouse).await?;
    info!("Warehouse connection established");

    let store = Arc::new(SeaOrmTableStore::new(database));
    let mut orchestrator = PipelineBuilder::new(Arc::new(config))
        .with_table_store(store)
        .build()?;

    let execution = orchestrator.execute_pipeline().await;
    Ok(execution.status)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EtlConfig::load_from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            // Logging settings live in the config; fall back to console defaults
            if init_fallback_logging(&cli.log_level) {
                error!("Failed to load configuration from {}: {}", cli.config, e);
            } else {
                eprintln!("Failed to load configuration from {}: {}", cli.config, e);
            }
            return ExitCode::FAILURE;
        }
    };

    match init_logging(&config.logging, &cli.log_level) {
        Ok(Some(path)) => info!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!("Starting MovieLens ETL v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);

    match run(config).await {
        Ok(status) => ExitCode::from(status.exit_status()),
        Err(e) => {
            error!("Pipeline could not start: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
