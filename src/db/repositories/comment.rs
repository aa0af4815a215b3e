//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Comment, CommentWithMeta, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get comments for an article, oldest first
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<CommentWithMeta>>;

    /// Get every comment, grouped by article then oldest first
    async fn list_all(&self) -> Result<Vec<CommentWithMeta>>;
}

/// Comment repository implementation
pub struct CommentRepositoryImpl {
    pool: DynDatabasePool,
}

impl CommentRepositoryImpl {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_WITH_AUTHOR: &str = r#"
    SELECT c.id, c.article_id, c.author_id, c.comment, c.created_at,
           u.username AS author_username
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
impl CommentRepository for CommentRepositoryImpl {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_mysql(pool, input).await,
        }
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<CommentWithMeta>> {
        let sql = format!("{} WHERE c.article_id = ? ORDER BY c.id ASC", SELECT_WITH_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to list comments for article")?
                .iter()
                .map(row_to_comment_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to list comments for article")?
                .iter()
                .map(row_to_comment_mysql)
                .collect(),
        }
    }

    async fn list_all(&self) -> Result<Vec<CommentWithMeta>> {
        let sql = format!("{} ORDER BY c.article_id ASC, c.id ASC", SELECT_WITH_AUTHOR);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_comment_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(row_to_comment_mysql)
                .collect(),
        }
    }
}

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, comment, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(input.author_id)
    .bind(&input.comment)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        article_id: input.article_id,
        author_id: input.author_id,
        comment: input.comment.clone(),
        created_at: now,
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CommentWithMeta> {
    Ok(CommentWithMeta {
        comment: Comment {
            id: row.try_get("id")?,
            article_id: row.try_get("article_id")?,
            author_id: row.try_get("author_id")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
        },
        author: row.try_get("author_username")?,
    })
}

// MySQL implementations (same shape as SQLite)
async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, comment, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(input.author_id)
    .bind(&input.comment)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        article_id: input.article_id,
        author_id: input.author_id,
        comment: input.comment.clone(),
        created_at: now,
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CommentWithMeta> {
    Ok(CommentWithMeta {
        comment: Comment {
            id: row.try_get("id")?,
            article_id: row.try_get("article_id")?,
            author_id: row.try_get("author_id")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
        },
        author: row.try_get("author_username")?,
    })
}
