//! Comment service
//!
//! Validates and stores comments posted on an article's detail page.

use crate::db::repositories::{ArticleRepository, CommentRepository};
use crate::models::{Comment, CreateCommentInput, COMMENT_MAX_LEN};
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// The article being commented on does not exist
    #[error("Article not found: {0}")]
    ArticleNotFound(i64),

    /// Blank or over-long comment
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    article_repo: Arc<dyn ArticleRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, article_repo }
    }

    /// Create a comment on an existing article
    pub async fn create(&self, input: CreateCommentInput) -> Result<Comment, CommentServiceError> {
        let text = validate_comment(&input.comment)?;

        if self
            .article_repo
            .get_by_id(input.article_id)
            .await
            .context("Failed to look up article")?
            .is_none()
        {
            return Err(CommentServiceError::ArticleNotFound(input.article_id));
        }

        let comment = self
            .repo
            .create(&CreateCommentInput {
                comment: text,
                ..input
            })
            .await
            .context("Failed to create comment")?;

        tracing::debug!(comment_id = comment.id, article_id = comment.article_id, "Comment added");
        Ok(comment)
    }
}

/// Trim a comment and check its length
pub fn validate_comment(text: &str) -> Result<String, CommentServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Comment cannot be empty.".to_string(),
        ));
    }
    let len = text.chars().count();
    if len > COMMENT_MAX_LEN {
        return Err(CommentServiceError::ValidationError(format!(
            "Ensure the comment has at most {} characters (it has {}).",
            COMMENT_MAX_LEN, len
        )));
    }
    Ok(text.to_string())
}
