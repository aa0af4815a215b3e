//! Services layer - Business logic
//!
//! This module contains the business logic of the newspaper site.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod article;
pub mod comment;
pub mod password;
pub mod user;

pub use article::{ArticleService, ArticleServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use password::{hash_password, verify_password};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
