//! Shared response helpers
//!
//! Redirects, session cookies and the error type handlers return.

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::services::{ArticleServiceError, CommentServiceError, UserServiceError};
use crate::theme::simple_error_page;
use crate::web::middleware::SESSION_COOKIE;

/// Path of the login page
pub const LOGIN_URL: &str = "/accounts/login/";

/// `302 Found` redirect
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `302 Found` redirect that also sets a cookie
pub fn found_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Login page that sends the user back to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, urlencoding::encode(next))
}

/// `Set-Cookie` value for a fresh session
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Where to go after login: `next` if it is a path on this site, else `/`
///
/// Browsers drop tabs and newlines from URLs, so `"/\t/host"` would become
/// `//host`; any control character rejects the path.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_ascii_control()) =>
        {
            path
        }
        _ => "/",
    }
}

/// Marker left on error responses for `render_error_pages`
#[derive(Debug, Clone, Copy)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: &'static str,
}

/// Errors a page handler can end with
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Page not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let page = match &self {
            PageError::NotFound => ErrorPage {
                status: StatusCode::NOT_FOUND,
                message: "The page you requested does not exist.",
            },
            PageError::Forbidden => ErrorPage {
                status: StatusCode::FORBIDDEN,
                message: "You do not have permission to do that.",
            },
            PageError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                ErrorPage {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Something went wrong on our end.",
                }
            }
        };

        let body = simple_error_page(page.status.as_str(), page.message);
        let mut response = (page.status, Html(body)).into_response();
        response.extensions_mut().insert(page);
        response
    }
}

impl From<ArticleServiceError> for PageError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(_) => PageError::NotFound,
            ArticleServiceError::Forbidden { .. } => PageError::Forbidden,
            ArticleServiceError::InternalError(e) => PageError::Internal(e),
            other @ ArticleServiceError::ValidationError(_) => {
                PageError::Internal(anyhow::anyhow!("Unhandled article validation: {}", other))
            }
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::ArticleNotFound(_) => PageError::NotFound,
            CommentServiceError::InternalError(e) => PageError::Internal(e),
            other @ CommentServiceError::ValidationError(_) => {
                PageError::Internal(anyhow::anyhow!("Unhandled comment validation: {}", other))
            }
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::Internal(anyhow::anyhow!("Unhandled account error: {}", other)),
        }
    }
}
