//! Article service
//!
//! Implements business logic for article management:
//! - Create, read, update, delete articles
//! - Validation
//! - Authorship checks for editing and deleting
//! - Joining authors and comments for display

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{
    Article, ArticleWithMeta, CommentWithMeta, CreateArticleInput, UpdateArticleInput,
    TITLE_MAX_LEN,
};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(i64),

    /// The current user is not the article's author
    #[error("User {user_id} may not modify article {article_id}")]
    Forbidden { article_id: i64, user_id: i64 },

    /// One message per invalid field
    #[error("Validation error: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Article service for managing newspaper articles
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    comment_repo: Arc<dyn CommentRepository>,
}

impl ArticleService {
    /// Create a new article service
    pub fn new(repo: Arc<dyn ArticleRepository>, comment_repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo, comment_repo }
    }

    /// Create a new article
    ///
    /// Title and body are trimmed before storing.
    pub async fn create(&self, input: CreateArticleInput) -> Result<Article, ArticleServiceError> {
        let (title, body) = validate_article_fields(&input.title, &input.body)?;

        let article = self
            .repo
            .create(&Article::new(title, body, input.author_id))
            .await
            .context("Failed to create article")?;

        tracing::info!(article_id = article.id, author_id = article.author_id, "Article created");
        Ok(article)
    }

    /// Get an article with its author and comments
    pub async fn get_with_meta(&self, id: i64) -> Result<ArticleWithMeta, ArticleServiceError> {
        let (article, author) = self
            .repo
            .get_with_author(id)
            .await
            .context("Failed to get article")?
            .ok_or(ArticleServiceError::NotFound(id))?;

        let comments = self
            .comment_repo
            .list_by_article(id)
            .await
            .context("Failed to list comments")?;

        Ok(ArticleWithMeta {
            article,
            author,
            comments,
        })
    }

    /// All articles in insertion order, each with author and comments
    pub async fn list_with_meta(&self) -> Result<Vec<ArticleWithMeta>, ArticleServiceError> {
        let articles = self
            .repo
            .list_with_authors()
            .await
            .context("Failed to list articles")?;

        let mut by_article: HashMap<i64, Vec<CommentWithMeta>> = HashMap::new();
        for comment in self
            .comment_repo
            .list_all()
            .await
            .context("Failed to list comments")?
        {
            by_article
                .entry(comment.comment.article_id)
                .or_default()
                .push(comment);
        }

        Ok(articles
            .into_iter()
            .map(|(article, author)| {
                let comments = by_article.remove(&article.id).unwrap_or_default();
                ArticleWithMeta {
                    article,
                    author,
                    comments,
                }
            })
            .collect())
    }

    /// Fetch an article the given user is allowed to modify
    ///
    /// # Errors
    ///
    /// - `NotFound` if the article does not exist
    /// - `Forbidden` if `user_id` is not the author
    pub async fn get_for_author(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Article, ArticleServiceError> {
        let article = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or(ArticleServiceError::NotFound(id))?;

        if article.author_id != user_id {
            return Err(ArticleServiceError::Forbidden {
                article_id: id,
                user_id,
            });
        }

        Ok(article)
    }

    /// Update title and body of an article owned by `user_id`
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        input: UpdateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        self.get_for_author(id, user_id).await?;
        let (title, body) = validate_article_fields(&input.title, &input.body)?;

        let updated = self
            .repo
            .update(id, &UpdateArticleInput { title, body })
            .await
            .context("Failed to update article")?;

        tracing::info!(article_id = id, "Article updated");
        Ok(updated)
    }

    /// Delete an article owned by `user_id`; its comments go with it
    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), ArticleServiceError> {
        self.get_for_author(id, user_id).await?;

        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete article")?;

        if !deleted {
            return Err(ArticleServiceError::NotFound(id));
        }

        tracing::info!(article_id = id, "Article deleted");
        Ok(())
    }
}

/// Check title and body, returning the trimmed values
pub fn validate_article_fields(
    title: &str,
    body: &str,
) -> Result<(String, String), ArticleServiceError> {
    let title = title.trim();
    let body = body.trim();
    let mut errors = Vec::new();

    if title.is_empty() {
        errors.push("Title is required.".to_string());
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors.push(format!(
            "Ensure the title has at most {} characters.",
            TITLE_MAX_LEN
        ));
    }

    if body.is_empty() {
        errors.push("Body is required.".to_string());
    }

    if !errors.is_empty() {
        return Err(ArticleServiceError::ValidationError(errors));
    }

    Ok((title.to_string(), body.to_string()))
}
