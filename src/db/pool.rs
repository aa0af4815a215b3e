//! Database connection pool abstraction
//!
//! The site runs on SQLite by default and on MySQL when configured. Both
//! sit behind [`DatabasePool`]; repositories ask for the [`Backend`] and
//! run the dialect-specific query.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Borrowed view of the concrete pool behind a [`DatabasePool`].
///
/// Repositories match on this to pick the SQL dialect.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

/// A connection pool for one of the supported databases
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Get the concrete pool
    fn backend(&self) -> Backend<'_>;

    /// Get the database driver type
    fn driver(&self) -> DatabaseDriver {
        match self.backend() {
            Backend::Sqlite(_) => DatabaseDriver::Sqlite,
            Backend::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    /// Execute a raw SQL statement, returning the affected row count
    async fn execute(&self, query: &str) -> Result<u64> {
        let affected = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query(query)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(query)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        affected.with_context(|| format!("Failed to execute query: {}", query))
    }

    /// Check that a connection can be acquired and used
    async fn ping(&self) -> Result<()> {
        let result = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Backend::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.context("Database ping failed")
    }
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// SQLite connection pool
pub struct SqliteDatabase {
    pool: SqlitePool,
}

/// A SQLite location from the config, resolved for sqlx
#[derive(Debug, PartialEq, Eq)]
struct SqliteTarget {
    url: String,
    /// Database file to create a parent directory for
    file: Option<String>,
}

impl SqliteTarget {
    /// Accepts `:memory:`, plain file paths and `sqlite:` URLs.
    /// File databases are opened with `mode=rwc` unless options are given.
    fn parse(url: &str) -> Self {
        if url == ":memory:" || url.starts_with("sqlite::memory:") {
            let url = if url == ":memory:" { "sqlite::memory:" } else { url };
            return Self {
                url: url.to_string(),
                file: None,
            };
        }

        let path = url.strip_prefix("sqlite:").unwrap_or(url);
        let (file, options) = match path.split_once('?') {
            Some((file, options)) => (file, Some(options)),
            None => (path, None),
        };

        let url = match options {
            Some(options) => format!("sqlite:{}?{}", file, options),
            None => format!("sqlite:{}?mode=rwc", file),
        };

        Self {
            url,
            file: Some(file.to_string()),
        }
    }

    fn is_memory(&self) -> bool {
        self.file.is_none()
    }
}

impl SqliteDatabase {
    /// Open (creating if needed) a SQLite database
    pub async fn new(url: &str) -> Result<Self> {
        let target = SqliteTarget::parse(url);

        if let Some(parent) = target.file.as_deref().and_then(|f| Path::new(f).parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {:?}", parent)
                })?;
            }
        }

        // Every connection to `:memory:` opens its own empty database.
        let options = if target.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(20)
        };

        let pool = options
            .connect(&target.url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .context("Failed to enable foreign keys")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    fn backend(&self) -> Backend<'_> {
        Backend::Sqlite(&self.pool)
    }
}

/// MySQL connection pool
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to a MySQL server; the `mysql://` scheme is optional
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    fn backend(&self) -> Backend<'_> {
        Backend::Mysql(&self.pool)
    }
}

/// Create a database connection pool based on configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::new(&config.url).await?),
    };
    Ok(pool)
}

/// Create a SQLite in-memory database pool for testing
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
