//! SeaORM-backed SQLite warehouse
//!
//! Every logical database (`database_name` in the configuration) is a SQLite
//! file attached to the main connection under its own schema name, so tables
//! are addressed as `"database"."table"`.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase, DatabaseBackend,
    DatabaseConnection, Statement,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{WarehouseConfig, is_valid_identifier};
use crate::errors::{AppError, AppResult, TableError, TableResult};

pub mod table_store;

pub use table_store::{SeaOrmTableStore, TableRef, TableStore};

/// Warehouse connection. Clones share the same pinned connection.
#[derive(Clone)]
pub struct Database {
    connection: Arc<DatabaseConnection>,
    /// Directory holding `{database_name}.db` files; `None` attaches in-memory databases
    warehouse_dir: Option<PathBuf>,
}

impl Database {
    pub async fn connect(config: &WarehouseConfig) -> AppResult<Self> {
        let connection_url = Self::ensure_sqlite_auto_creation(&config.url)?;
        info!("Connecting to warehouse at {}", connection_url);

        let mut connect_options = ConnectOptions::new(&connection_url);
        // ATTACH is per-connection: keep exactly one, and keep it for the whole run
        connect_options
            .max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(60))
            .idle_timeout(Duration::from_secs(24 * 60 * 60))
            .max_lifetime(Duration::from_secs(24 * 60 * 60))
            .sqlx_logging(false);

        let connection = match SeaOrmDatabase::connect(connect_options).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Warehouse connection failed: {:?}", e);
                let mut source = e.source();
                let mut level = 0;
                while let Some(err) = source {
                    error!("  Level {}: {}", level, err);
                    source = err.source();
                    level += 1;
                }
                return Err(AppError::Database(e));
            }
        };

        if let Some(dir) = &config.directory {
            tokio::fs::create_dir_all(dir).await?;
        }

        debug!("Warehouse connection established");
        Ok(Self {
            connection: Arc::new(connection),
            warehouse_dir: config.directory.clone(),
        })
    }

    /// Fully in-memory warehouse, used by tests and dry runs
    pub async fn in_memory() -> AppResult<Self> {
        Self::connect(&WarehouseConfig {
            url: "sqlite::memory:".to_string(),
            directory: None,
        })
        .await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    /// Attach `{warehouse_dir}/{database_name}.db` as schema `database_name`.
    /// No-op when it is already attached.
    pub async fn attach(&self, database_name: &str) -> TableResult<()> {
        if !is_valid_identifier(database_name) {
            return Err(TableError::InvalidIdentifier {
                identifier: database_name.to_string(),
            });
        }

        if self.attached_databases().await?.iter().any(|name| name == database_name) {
            return Ok(());
        }

        let file = match &self.warehouse_dir {
            Some(dir) => dir.join(format!("{database_name}.db")).display().to_string(),
            None => ":memory:".to_string(),
        };

        self.connection
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                format!(r#"ATTACH DATABASE ? AS "{database_name}""#),
                [file.clone().into()],
            ))
            .await?;

        info!("Attached database {} ({})", database_name, file);
        Ok(())
    }

    async fn attached_databases(&self) -> TableResult<Vec<String>> {
        let rows = self
            .connection
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "PRAGMA database_list".to_string(),
            ))
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String>("", "name").map_err(TableError::from))
            .collect()
    }

    /// Make sure the parent directory of a file-backed SQLite URL exists and
    /// that the file is created on first connect.
    fn ensure_sqlite_auto_creation(url: &str) -> AppResult<String> {
        if url.contains(":memory:") {
            return Ok(url.to_string());
        }

        let file_part = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .ok_or_else(|| AppError::configuration(format!("Invalid SQLite URL format: {url}")))?;
        let file_path = file_part.split('?').next().unwrap_or(file_part);

        if let Some(parent) = Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created directory for warehouse database: {}", parent.display());
            }
        }

        if url.contains("mode=") {
            Ok(url.to_string())
        } else if url.contains('?') {
            Ok(format!("{url}&mode=rwc"))
        } else {
            Ok(format!("{url}?mode=rwc"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_url_gets_create_mode() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/warehouse.db", dir.path().display());

        let resolved = Database::ensure_sqlite_auto_creation(&url).unwrap();

        assert!(resolved.ends_with("?mode=rwc"));
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_memory_url_is_untouched() {
        assert_eq!(
            Database::ensure_sqlite_auto_creation("sqlite::memory:").unwrap(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn test_non_sqlite_url_is_rejected() {
        assert!(Database::ensure_sqlite_auto_creation("postgres://localhost/db").is_err());
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let database = Database::in_memory().await.unwrap();

        database.attach("movies_data").await.unwrap();
        database.attach("movies_data").await.unwrap();

        let attached = database.attached_databases().await.unwrap();
        assert_eq!(attached.iter().filter(|name| *name == "movies_data").count(), 1);
    }

    #[tokio::test]
    async fn test_attach_rejects_unsafe_names() {
        let database = Database::in_memory().await.unwrap();
        let err = database.attach("x\" AS y; --").await.unwrap_err();
        assert!(matches!(err, TableError::InvalidIdentifier { .. }));
    }

    #[tokio::test]
    async fn test_file_backed_attach_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = WarehouseConfig {
            url: format!("sqlite://{}/main.db", dir.path().display()),
            directory: Some(dir.path().join("warehouse")),
        };

        let database = Database::connect(&config).await.unwrap();
        database.attach("movies_data").await.unwrap();
        database
            .connection()
            .execute_unprepared(r#"CREATE TABLE "movies_data"."probe" (id INTEGER)"#)
            .await
            .unwrap();

        assert!(dir.path().join("warehouse/movies_data.db").exists());
    }
}
