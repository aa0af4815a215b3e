//! Article model
//!
//! This module provides:
//! - `Article` entity representing a newspaper article
//! - `ArticleWithMeta`, the article as pages show it (author name, comments)
//! - Input types for creating and updating articles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CommentWithMeta;

/// Longest title accepted
pub const TITLE_MAX_LEN: usize = 255;

/// Article entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Headline
    pub title: String,
    /// Plain-text body
    pub body: String,
    /// Author user ID
    pub author_id: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article with the given parameters
    pub fn new(title: String, body: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            title,
            body,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Path of the detail page
    pub fn absolute_url(&self) -> String {
        detail_url(self.id)
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Path of the detail page for article `id`
pub fn detail_url(id: i64) -> String {
    format!("/articles/{}/", id)
}

/// Article joined with its author's username and its comments
#[derive(Debug, Clone, Serialize)]
pub struct ArticleWithMeta {
    #[serde(flatten)]
    pub article: Article,
    /// Author username
    pub author: String,
    /// Comments, oldest first
    pub comments: Vec<CommentWithMeta>,
}

/// Input for creating an article
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    pub title: String,
    pub body: String,
    pub author_id: i64,
}

/// Input for updating an article (title and body only)
#[derive(Debug, Clone)]
pub struct UpdateArticleInput {
    pub title: String,
    pub body: String,
}
