//! Article repository
//!
//! Database operations for articles.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Listing queries join `users` so callers get the author's username with
//! each article.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Article, UpdateArticleInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// An article paired with its author's username
pub type AuthoredArticle = (Article, String);

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article
    async fn create(&self, article: &Article) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Get article by ID together with its author's username
    async fn get_with_author(&self, id: i64) -> Result<Option<AuthoredArticle>>;

    /// All articles with author usernames, in insertion order
    async fn list_with_authors(&self) -> Result<Vec<AuthoredArticle>>;

    /// Replace title and body, bumping `updated_at`
    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article>;

    /// Delete an article; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_ARTICLE: &str =
    "SELECT id, title, body, author_id, created_at, updated_at FROM articles WHERE id = ?";

const SELECT_AUTHORED: &str = r#"
    SELECT a.id, a.title, a.body, a.author_id, a.created_at, a.updated_at,
           u.username AS author_username
    FROM articles a
    JOIN users u ON u.id = a.author_id
"#;

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &Article) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_article_sqlite(pool, article).await,
            Backend::Mysql(pool) => create_article_mysql(pool, article).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(SELECT_ARTICLE)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(SELECT_ARTICLE)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_mysql).transpose()
            }
        }
    }

    async fn get_with_author(&self, id: i64) -> Result<Option<AuthoredArticle>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_AUTHORED);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article with author")?;
                row.as_ref().map(row_to_authored_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get article with author")?;
                row.as_ref().map(row_to_authored_mysql).transpose()
            }
        }
    }

    async fn list_with_authors(&self) -> Result<Vec<AuthoredArticle>> {
        let sql = format!("{} ORDER BY a.id ASC", SELECT_AUTHORED);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list articles")?
                .iter()
                .map(row_to_authored_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list articles")?
                .iter()
                .map(row_to_authored_mysql)
                .collect(),
        }
    }

    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article> {
        let sql = "UPDATE articles SET title = ?, body = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(&input.title)
                    .bind(&input.body)
                    .bind(now)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update article")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(&input.title)
                    .bind(&input.body)
                    .bind(now)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update article")?;
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Article not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM articles WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete article")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete article")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, body, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.title)
    .bind(&article.body)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_authored_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AuthoredArticle> {
    Ok((row_to_article_sqlite(row)?, row.try_get("author_username")?))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, article: &Article) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, body, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.title)
    .bind(&article.body)
    .bind(article.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..article.clone()
    })
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_authored_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AuthoredArticle> {
    Ok((row_to_article_mysql(row)?, row.try_get("author_username")?))
}
