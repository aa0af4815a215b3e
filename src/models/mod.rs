//! Data models
//!
//! This module contains the data structures used throughout the site:
//! - Database entities (User, Session, Article, Comment)
//! - Display types joined with author names
//! - Input types handed from handlers to services

mod article;
mod comment;
mod session;
mod user;

pub use article::{
    detail_url, Article, ArticleWithMeta, CreateArticleInput, UpdateArticleInput, TITLE_MAX_LEN,
};
pub use comment::{Comment, CommentWithMeta, CreateCommentInput, COMMENT_MAX_LEN};
pub use session::Session;
pub use user::{CreateUserInput, User};
