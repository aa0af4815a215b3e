//! Web middleware
//!
//! Contains middleware for:
//! - Session loading (session cookie to current user)
//! - Login gating for protected pages
//! - Rendering error pages with the site templates

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::config::SessionConfig;
use crate::db::repositories::{
    CommentRepositoryImpl, SqlxArticleRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{ArticleService, CommentService, UserService};
use crate::theme::{StandardTemplateVars, ThemeEngine};
use crate::web::responses::{found, login_url, ErrorPage, PageError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub article_service: Arc<ArticleService>,
    pub comment_service: Arc<CommentService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub session_config: Arc<SessionConfig>,
    pub site_name: Arc<str>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(
        pool: DynDatabasePool,
        session_config: SessionConfig,
        site_name: &str,
        theme_engine: ThemeEngine,
    ) -> Self {
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let comment_repo = CommentRepositoryImpl::boxed(pool.clone());

        let user_service = UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            session_config.expiration_days,
        );

        Self {
            user_service: Arc::new(user_service),
            article_service: Arc::new(ArticleService::new(
                article_repo.clone(),
                comment_repo.clone(),
            )),
            comment_service: Arc::new(CommentService::new(comment_repo, article_repo)),
            theme_engine: Arc::new(theme_engine),
            session_config: Arc::new(session_config),
            site_name: Arc::from(site_name),
        }
    }

    /// Render a page template with the standard variables for `user`
    pub fn render(
        &self,
        template: &str,
        context: &TeraContext,
        user: Option<&User>,
    ) -> Result<Html<String>, PageError> {
        let vars = StandardTemplateVars::new(&*self.site_name).with_user(user);
        self.theme_engine
            .render_page(template, context, &vars)
            .map(Html)
            .map_err(PageError::Internal)
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Extract session token from the `Cookie` header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolve the session cookie into an `AuthenticatedUser` extension.
///
/// Runs on every request; anonymous requests pass through untouched.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Login gate
///
/// Anonymous requests are redirected to the login page with the original
/// path in `next`.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_some() {
        return next.run(request).await;
    }

    let original = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    tracing::debug!("Anonymous request to {}, redirecting to login", original);
    found(&login_url(original))
}

/// Replace bodies of error responses with the rendered `error.html`
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|au| au.0.clone());

    let mut response = next.run(request).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status", &page.status.as_u16());
    context.insert("error_message", page.message);

    let vars = StandardTemplateVars::new(&*state.site_name).with_user(user.as_ref());
    let html = state
        .theme_engine
        .render_with_fallback("error.html", &vars.extend(&context));

    (page.status, Html(html)).into_response()
}
