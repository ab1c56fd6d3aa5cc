//! # Metadata Store Connection Module
//!
//! Opens the SQLite database holding sources, folders, file records, index
//! session entries and transform indexes.
//!
//! ## Overview
//!
//! - File databases run in WAL mode so index steps and file operations can
//!   read while another step writes.
//! - Foreign keys are always enforced; deleting a folder relies on cascades to
//!   drop its subtree, file records and transform indexes.
//! - Embedded migrations are applied every time a pool is opened.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new(&engine_config.database_path)).await?;
//! let folders = SqliteFolderRepository::new(pool.clone());
//! ```
//!
//! Tests use [`create_test_pool`], an in-memory database with the schema applied.

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the metadata database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private in-memory database, dropped with the pool
    Memory,
}

/// Metadata store pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    pub max_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    /// How long SQLite retries while another connection holds the write lock
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// Settings for a database file, created if missing
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(database_path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Settings for an in-memory database
    ///
    /// Each SQLite connection to `:memory:` sees its own database, so the pool
    /// holds exactly one connection.
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        if self.location != DatabaseLocation::Memory {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            DatabaseLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        options
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Open a pool, apply migrations and verify the connection
///
/// # Errors
///
/// - [`LibraryError::Database`] when the file cannot be opened
/// - [`LibraryError::Migration`] when the schema cannot be brought up to date
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        location = ?config.location,
        max_connections = config.max_connections,
        "Opening metadata store"
    );

    if let DatabaseLocation::File(path) = &config.location {
        ensure_parent_dir(path)?;
    }

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);
    if config.location == DatabaseLocation::Memory {
        // The database disappears with its last connection
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open metadata store");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;

    debug!(connections = pool.size(), "Metadata store ready");
    Ok(pool)
}

/// In-memory metadata store with the schema applied
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LibraryError::Migration(e.to_string()))?;
    debug!("Migrations applied");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    std::fs::create_dir_all(parent).map_err(|e| LibraryError::InvalidInput {
        field: "database_path".to_string(),
        message: format!("cannot create {}: {}", parent.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_exists(pool: &Pool<Sqlite>, table: &str) -> bool {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(pool)
                .await
                .unwrap();
        count == 1
    }

    #[tokio::test]
    async fn test_schema_is_applied() {
        let pool = create_test_pool().await.unwrap();

        for table in ["sources", "folders", "assets", "index_entries", "transform_indexes"] {
            assert!(table_exists(&pool, table).await, "{} table should exist", table);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = create_test_pool().await.unwrap();

        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_in_memory_pool_keeps_one_connection() {
        let config = DatabaseConfig::in_memory().max_connections(8);
        assert_eq!(config.max_connections, 1);

        let pool = create_pool(config).await.unwrap();
        sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        // A second connection would not see the table
        assert!(table_exists(&pool, "scratch").await);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal_and_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("metadata.db");

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_reopening_runs_migrations_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.db");

        let first = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        first.close().await;

        let second = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        assert!(table_exists(&second, "folders").await);
    }
}
