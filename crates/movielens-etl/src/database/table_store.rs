//! Table read/write boundary.
//!
//! Writes always overwrite: the old table is dropped, recreated and filled in
//! a single transaction, so readers see either the previous table or the
//! complete new one. Loads that span several tables write into scratch tables
//! first and publish them together with [`TableStore::replace_tables`].

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, QueryResult, Statement, TransactionTrait, Value,
};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

use super::Database;
use crate::config::{DatabaseTablesConfig, is_valid_identifier};
use crate::errors::{TableError, TableResult};
use crate::models::{ExplodedGenreRecord, MovieRecord, RatingRecord, TagRecord};
use crate::utils::human_format::format_duration_precise;

/// SQLite's compiled-in host parameter limit (3.32+)
const SQLITE_MAX_VARIABLES: usize = 32766;

type ColumnDefs = &'static [(&'static str, &'static str)];

const MOVIE_COLUMNS: ColumnDefs = &[
    ("movieId", "INTEGER NOT NULL"),
    ("title", "TEXT NOT NULL"),
    ("genres", "TEXT NOT NULL"),
];

const RATING_COLUMNS: ColumnDefs = &[
    ("userId", "INTEGER NOT NULL"),
    ("movieId", "INTEGER NOT NULL"),
    ("rating", "REAL NOT NULL"),
    ("timestamp", "TEXT NOT NULL"),
];

const RATING_UPDATE_COLUMNS: ColumnDefs = &[
    ("userId", "INTEGER NOT NULL"),
    ("movieId", "INTEGER NOT NULL"),
    ("rating", "REAL NOT NULL"),
    ("timestamp", "TEXT NOT NULL"),
    ("rated_at", "TEXT"),
];

const TAG_COLUMNS: ColumnDefs = &[
    ("userId", "INTEGER NOT NULL"),
    ("movieId", "INTEGER NOT NULL"),
    ("tag", "TEXT NOT NULL"),
    ("timestamp", "TEXT NOT NULL"),
];

const EXPLODED_COLUMNS: ColumnDefs = &[
    ("movieId", "INTEGER NOT NULL"),
    ("title", "TEXT NOT NULL"),
    ("genre", "TEXT NOT NULL"),
];

/// A validated `database.table` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    database: String,
    table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> TableResult<Self> {
        let database = database.into();
        let table = table.into();
        for identifier in [&database, &table] {
            if !is_valid_identifier(identifier) {
                return Err(TableError::InvalidIdentifier {
                    identifier: identifier.clone(),
                });
            }
        }
        Ok(Self { database, table })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sibling table in the same database that a multi-table load fills
    /// before [`TableStore::replace_tables`] publishes it
    pub fn scratch(&self) -> TableRef {
        Self {
            database: self.database.clone(),
            table: format!("{}__load", self.table),
        }
    }

    fn quoted(&self) -> String {
        format!(r#""{}"."{}""#, self.database, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// The named tables one pipeline run reads and writes
#[derive(Debug, Clone)]
pub struct PipelineTables {
    pub movies: TableRef,
    pub tags: TableRef,
    pub ratings: TableRef,
    pub ratings_update: TableRef,
    pub exploded_movies: TableRef,
}

impl PipelineTables {
    pub fn from_config(config: &DatabaseTablesConfig) -> TableResult<Self> {
        let db = config.database_name.as_str();
        Ok(Self {
            movies: TableRef::new(db, config.movies_table_name.as_str())?,
            tags: TableRef::new(db, config.tags_table_name.as_str())?,
            ratings: TableRef::new(db, config.ratings_table_name.as_str())?,
            ratings_update: TableRef::new(db, config.ratings_update_table_name.as_str())?,
            exploded_movies: TableRef::new(db, config.exploded_movies_table_name.as_str())?,
        })
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn table_exists(&self, table: &TableRef) -> TableResult<bool>;

    async fn count_rows(&self, table: &TableRef) -> TableResult<u64>;

    async fn read_movies(&self, table: &TableRef) -> TableResult<Vec<MovieRecord>>;

    async fn read_ratings(&self, table: &TableRef) -> TableResult<Vec<RatingRecord>>;

    async fn read_exploded(&self, table: &TableRef) -> TableResult<Vec<ExplodedGenreRecord>>;

    async fn overwrite_movies(&self, table: &TableRef, rows: &[MovieRecord]) -> TableResult<u64>;

    async fn overwrite_ratings(&self, table: &TableRef, rows: &[RatingRecord]) -> TableResult<u64>;

    /// Ratings plus a derived `rated_at` column
    async fn overwrite_ratings_update(
        &self,
        table: &TableRef,
        rows: &[RatingRecord],
    ) -> TableResult<u64>;

    async fn overwrite_tags(&self, table: &TableRef, rows: &[TagRecord]) -> TableResult<u64>;

    async fn overwrite_exploded(
        &self,
        table: &TableRef,
        rows: &[ExplodedGenreRecord],
    ) -> TableResult<u64>;

    /// Renames every `(scratch, target)` pair over its target in one
    /// transaction. Either all targets are replaced or none are.
    async fn replace_tables(&self, replacements: &[(TableRef, TableRef)]) -> TableResult<()>;

    async fn drop_table(&self, table: &TableRef) -> TableResult<()>;
}

/// [`TableStore`] over the SeaORM SQLite warehouse
#[derive(Clone)]
pub struct SeaOrmTableStore {
    database: Database,
}

impl SeaOrmTableStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    async fn require_table(&self, table: &TableRef) -> TableResult<()> {
        if self.table_exists(table).await? {
            Ok(())
        } else {
            Err(TableError::NotFound {
                table: table.to_string(),
            })
        }
    }

    async fn select_all(&self, table: &TableRef, columns: ColumnDefs) -> TableResult<Vec<QueryResult>> {
        debug!("Reading table {}", table);
        self.database.attach(table.database()).await?;
        self.require_table(table).await?;

        let column_list = columns
            .iter()
            .map(|(name, _)| format!(r#""{name}""#))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = self
            .database
            .connection()
            .query_all(Statement::from_string(
                self.database.backend(),
                format!("SELECT {column_list} FROM {}", table.quoted()),
            ))
            .await?;

        debug!("Read {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn overwrite_rows(
        &self,
        table: &TableRef,
        columns: ColumnDefs,
        rows: Vec<Vec<Value>>,
    ) -> TableResult<u64> {
        let write_start = Instant::now();
        debug!("Overwriting table {} with {} rows", table, rows.len());
        self.database.attach(table.database()).await?;

        let column_defs = columns
            .iter()
            .map(|(name, sql_type)| format!(r#""{name}" {sql_type}"#))
            .collect::<Vec<_>>()
            .join(", ");
        let column_list = columns
            .iter()
            .map(|(name, _)| format!(r#""{name}""#))
            .collect::<Vec<_>>()
            .join(", ");
        let row_placeholder = format!("({})", vec!["?"; columns.len()].join(", "));
        let rows_per_batch = (SQLITE_MAX_VARIABLES / columns.len()).max(1);

        let txn = self.database.connection().begin().await?;
        txn.execute_unprepared(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
            .await?;
        txn.execute_unprepared(&format!("CREATE TABLE {} ({column_defs})", table.quoted()))
            .await?;

        for chunk in rows.chunks(rows_per_batch) {
            let placeholders = vec![row_placeholder.as_str(); chunk.len()].join(", ");
            let values: Vec<Value> = chunk.iter().flatten().cloned().collect();
            txn.execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                format!(
                    "INSERT INTO {} ({column_list}) VALUES {placeholders}",
                    table.quoted()
                ),
                values,
            ))
            .await?;
        }

        txn.commit().await?;

        let written = rows.len() as u64;
        info!(
            "Table {} overwritten: rows={} duration={}",
            table,
            written,
            format_duration_precise(write_start.elapsed())
        );
        Ok(written)
    }
}

fn malformed(table: &TableRef, error: sea_orm::DbErr) -> TableError {
    TableError::MalformedRow {
        table: table.to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl TableStore for SeaOrmTableStore {
    async fn table_exists(&self, table: &TableRef) -> TableResult<bool> {
        self.database.attach(table.database()).await?;
        let row = self
            .database
            .connection()
            .query_one(Statement::from_sql_and_values(
                self.database.backend(),
                format!(
                    r#"SELECT COUNT(*) AS n FROM "{}".sqlite_master WHERE type = 'table' AND name = ?"#,
                    table.database()
                ),
                [table.table().into()],
            ))
            .await?;

        let count = match row {
            Some(row) => row.try_get::<i64>("", "n")?,
            None => 0,
        };
        Ok(count > 0)
    }

    async fn count_rows(&self, table: &TableRef) -> TableResult<u64> {
        self.database.attach(table.database()).await?;
        self.require_table(table).await?;
        let row = self
            .database
            .connection()
            .query_one(Statement::from_string(
                self.database.backend(),
                format!("SELECT COUNT(*) AS n FROM {}", table.quoted()),
            ))
            .await?;

        let count = match row {
            Some(row) => row.try_get::<i64>("", "n")?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn read_movies(&self, table: &TableRef) -> TableResult<Vec<MovieRecord>> {
        self.select_all(table, MOVIE_COLUMNS)
            .await?
            .iter()
            .map(|row| {
                Ok(MovieRecord {
                    movie_id: row.try_get("", "movieId").map_err(|e| malformed(table, e))?,
                    title: row.try_get("", "title").map_err(|e| malformed(table, e))?,
                    genres: row.try_get("", "genres").map_err(|e| malformed(table, e))?,
                })
            })
            .collect()
    }

    async fn read_ratings(&self, table: &TableRef) -> TableResult<Vec<RatingRecord>> {
        self.select_all(table, RATING_COLUMNS)
            .await?
            .iter()
            .map(|row| {
                Ok(RatingRecord {
                    user_id: row.try_get("", "userId").map_err(|e| malformed(table, e))?,
                    movie_id: row.try_get("", "movieId").map_err(|e| malformed(table, e))?,
                    rating: row.try_get("", "rating").map_err(|e| malformed(table, e))?,
                    timestamp: row.try_get("", "timestamp").map_err(|e| malformed(table, e))?,
                })
            })
            .collect()
    }

    async fn read_exploded(&self, table: &TableRef) -> TableResult<Vec<ExplodedGenreRecord>> {
        self.select_all(table, EXPLODED_COLUMNS)
            .await?
            .iter()
            .map(|row| {
                Ok(ExplodedGenreRecord {
                    movie_id: row.try_get("", "movieId").map_err(|e| malformed(table, e))?,
                    title: row.try_get("", "title").map_err(|e| malformed(table, e))?,
                    genre: row.try_get("", "genre").map_err(|e| malformed(table, e))?,
                })
            })
            .collect()
    }

    async fn overwrite_movies(&self, table: &TableRef, rows: &[MovieRecord]) -> TableResult<u64> {
        let values = rows
            .iter()
            .map(|movie| {
                vec![
                    movie.movie_id.into(),
                    movie.title.clone().into(),
                    movie.genres.clone().into(),
                ]
            })
            .collect();
        self.overwrite_rows(table, MOVIE_COLUMNS, values).await
    }

    async fn overwrite_ratings(&self, table: &TableRef, rows: &[RatingRecord]) -> TableResult<u64> {
        let values = rows
            .iter()
            .map(|rating| {
                vec![
                    rating.user_id.into(),
                    rating.movie_id.into(),
                    rating.rating.into(),
                    rating.timestamp.clone().into(),
                ]
            })
            .collect();
        self.overwrite_rows(table, RATING_COLUMNS, values).await
    }

    async fn overwrite_ratings_update(
        &self,
        table: &TableRef,
        rows: &[RatingRecord],
    ) -> TableResult<u64> {
        let values = rows
            .iter()
            .map(|rating| {
                vec![
                    rating.user_id.into(),
                    rating.movie_id.into(),
                    rating.rating.into(),
                    rating.timestamp.clone().into(),
                    rating.rated_at().into(),
                ]
            })
            .collect();
        self.overwrite_rows(table, RATING_UPDATE_COLUMNS, values).await
    }

    async fn overwrite_tags(&self, table: &TableRef, rows: &[TagRecord]) -> TableResult<u64> {
        let values = rows
            .iter()
            .map(|tag| {
                vec![
                    tag.user_id.into(),
                    tag.movie_id.into(),
                    tag.tag.clone().into(),
                    tag.timestamp.clone().into(),
                ]
            })
            .collect();
        self.overwrite_rows(table, TAG_COLUMNS, values).await
    }

    async fn overwrite_exploded(
        &self,
        table: &TableRef,
        rows: &[ExplodedGenreRecord],
    ) -> TableResult<u64> {
        let values = rows
            .iter()
            .map(|row| {
                vec![
                    row.movie_id.into(),
                    row.title.clone().into(),
                    row.genre.clone().into(),
                ]
            })
            .collect();
        self.overwrite_rows(table, EXPLODED_COLUMNS, values).await
    }

    async fn replace_tables(&self, replacements: &[(TableRef, TableRef)]) -> TableResult<()> {
        for (scratch, target) in replacements {
            if scratch.database() != target.database() {
                return Err(TableError::CrossDatabase {
                    source_table: scratch.to_string(),
                    target: target.to_string(),
                });
            }
            self.database.attach(target.database()).await?;
            self.require_table(scratch).await?;
        }

        let txn = self.database.connection().begin().await?;
        for (scratch, target) in replacements {
            txn.execute_unprepared(&format!("DROP TABLE IF EXISTS {}", target.quoted()))
                .await?;
            txn.execute_unprepared(&format!(
                r#"ALTER TABLE {} RENAME TO "{}""#,
                scratch.quoted(),
                target.table()
            ))
            .await?;
        }
        txn.commit().await?;

        info!("Replaced {} tables", replacements.len());
        Ok(())
    }

    async fn drop_table(&self, table: &TableRef) -> TableResult<()> {
        self.database.attach(table.database()).await?;
        self.database
            .connection()
            .execute_unprepared(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
            .await?;
        debug!("Dropped table {}", table);
        Ok(())
    }
}
