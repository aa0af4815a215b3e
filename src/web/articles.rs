//! Article pages
//!
//! Every handler here sits behind the login gate, so the
//! `AuthenticatedUser` extension is always present.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::models::{detail_url, CreateArticleInput, CreateCommentInput, UpdateArticleInput, User};
use crate::services::{ArticleServiceError, CommentServiceError};
use crate::web::middleware::{AppState, AuthenticatedUser};
use crate::web::responses::{found, PageError};

/// Title/body form used by both create and edit
///
/// Any other submitted field (such as `author`) is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArticleForm {
    pub title: String,
    pub body: String,
}

/// Comment form on the detail page
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub comment: String,
}

/// Article ids come from the path as text so that junk is a 404, not a 400
fn parse_id(raw: &str) -> Result<i64, PageError> {
    raw.parse::<i64>().map_err(|_| PageError::NotFound)
}

fn form_context(title: &str, body: &str, errors: &[String]) -> TeraContext {
    let mut ctx = TeraContext::new();
    ctx.insert("title", title);
    ctx.insert("body", body);
    ctx.insert("errors", errors);
    ctx
}

/// GET /articles/
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Response, PageError> {
    let articles = state.article_service.list_with_meta().await?;

    let mut ctx = TeraContext::new();
    ctx.insert("articles", &articles);
    Ok(state.render("article_list.html", &ctx, Some(&user))?.into_response())
}

async fn render_detail(
    state: &AppState,
    user: &User,
    id: i64,
    comment_text: &str,
    errors: &[String],
) -> Result<Response, PageError> {
    let article = state.article_service.get_with_meta(id).await?;

    let mut ctx = TeraContext::new();
    ctx.insert("article", &article);
    ctx.insert("comment_text", comment_text);
    ctx.insert("errors", errors);
    Ok(state.render("article_detail.html", &ctx, Some(user))?.into_response())
}

/// GET /articles/{id}/
pub async fn detail(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;
    render_detail(&state, &user, id, "", &[]).await
}

/// POST /articles/{id}/ adds a comment
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;

    let input = CreateCommentInput {
        article_id: id,
        author_id: user.id,
        comment: form.comment.clone(),
    };

    match state.comment_service.create(input).await {
        Ok(_) => Ok(found(&detail_url(id))),
        Err(CommentServiceError::ValidationError(msg)) => {
            render_detail(&state, &user, id, &form.comment, &[msg]).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /articles/new/
pub async fn new_form(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Response, PageError> {
    let ctx = form_context("", "", &[]);
    Ok(state.render("article_new.html", &ctx, Some(&user))?.into_response())
}

/// POST /articles/new/
pub async fn create(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Form(form): Form<ArticleForm>,
) -> Result<Response, PageError> {
    let input = CreateArticleInput {
        title: form.title.clone(),
        body: form.body.clone(),
        author_id: user.id,
    };

    match state.article_service.create(input).await {
        Ok(article) => Ok(found(&article.absolute_url())),
        Err(ArticleServiceError::ValidationError(errors)) => {
            let ctx = form_context(&form.title, &form.body, &errors);
            Ok(state.render("article_new.html", &ctx, Some(&user))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /articles/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;
    let article = state.article_service.get_for_author(id, user.id).await?;

    let mut ctx = form_context(&article.title, &article.body, &[]);
    ctx.insert("article_id", &article.id);
    Ok(state.render("article_edit.html", &ctx, Some(&user))?.into_response())
}

/// POST /articles/{id}/edit/
pub async fn update(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
    Form(form): Form<ArticleForm>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;
    let input = UpdateArticleInput {
        title: form.title.clone(),
        body: form.body.clone(),
    };

    match state.article_service.update(id, user.id, input).await {
        Ok(article) => Ok(found(&article.absolute_url())),
        Err(ArticleServiceError::ValidationError(errors)) => {
            let mut ctx = form_context(&form.title, &form.body, &errors);
            ctx.insert("article_id", &id);
            Ok(state.render("article_edit.html", &ctx, Some(&user))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /articles/{id}/delete/
pub async fn delete_form(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;
    let article = state.article_service.get_for_author(id, user.id).await?;

    let mut ctx = TeraContext::new();
    ctx.insert("article", &article);
    Ok(state.render("article_delete.html", &ctx, Some(&user))?.into_response())
}

/// POST /articles/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&raw_id)?;
    state.article_service.delete(id, user.id).await?;
    Ok(found("/articles/"))
}
