//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest comment accepted
pub const COMMENT_MAX_LEN: usize = 140;

/// Comment entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Comments link back to the article list
    pub fn absolute_url(&self) -> String {
        "/articles/".to_string()
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.comment)
    }
}

/// Comment with its author's username for display
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
}

/// Input for creating a comment
#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub article_id: i64,
    pub author_id: i64,
    pub comment: String,
}
