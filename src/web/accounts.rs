//! Account pages: sign-up, login, logout

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::services::{LoginInput, RegisterInput, UserServiceError};
use crate::web::middleware::{extract_session_token, AppState, AuthenticatedUser};
use crate::web::responses::{
    clear_session_cookie, found, found_with_cookie, safe_next, session_cookie, PageError,
    LOGIN_URL,
};

/// Sign-up form fields
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub age: String,
    pub password1: String,
    pub password2: String,
}

/// Login form fields
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// `?next=` on the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn signup_context(form: &SignupForm, errors: &[String]) -> TeraContext {
    let mut ctx = TeraContext::new();
    ctx.insert("username", &form.username);
    ctx.insert("email", &form.email);
    ctx.insert("age", &form.age);
    ctx.insert("errors", errors);
    ctx
}

fn login_context(username: &str, next: &str, errors: &[String]) -> TeraContext {
    let mut ctx = TeraContext::new();
    ctx.insert("username", username);
    ctx.insert("next", next);
    ctx.insert("errors", errors);
    ctx
}

/// GET /accounts/signup/
pub async fn signup_form(
    State(state): State<AppState>,
    current: Option<Extension<AuthenticatedUser>>,
) -> Result<Response, PageError> {
    let user = current.as_ref().map(|Extension(au)| &au.0);
    let ctx = signup_context(&SignupForm::default(), &[]);
    Ok(state.render("registration/signup.html", &ctx, user)?.into_response())
}

/// POST /accounts/signup/
pub async fn signup(
    State(state): State<AppState>,
    current: Option<Extension<AuthenticatedUser>>,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    let input = RegisterInput {
        username: form.username.clone(),
        email: form.email.clone(),
        age: form.age.clone(),
        password1: form.password1.clone(),
        password2: form.password2.clone(),
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(found(LOGIN_URL)),
        Err(UserServiceError::InternalError(e)) => Err(PageError::Internal(e)),
        Err(e) => {
            let user = current.as_ref().map(|Extension(au)| &au.0);
            let ctx = signup_context(&form, &e.messages());
            Ok(state.render("registration/signup.html", &ctx, user)?.into_response())
        }
    }
}

/// GET /accounts/login/
pub async fn login_form(
    State(state): State<AppState>,
    current: Option<Extension<AuthenticatedUser>>,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let user = current.as_ref().map(|Extension(au)| &au.0);
    let ctx = login_context("", query.next.as_deref().unwrap_or(""), &[]);
    Ok(state.render("registration/login.html", &ctx, user)?.into_response())
}

/// POST /accounts/login/
pub async fn login(
    State(state): State<AppState>,
    current: Option<Extension<AuthenticatedUser>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let input = LoginInput::new(form.username.clone(), form.password.clone());

    match state.user_service.login(input).await {
        Ok(session) => {
            let cookie = session_cookie(
                &session.id,
                session.max_age_secs(),
                state.session_config.secure_cookie,
            );
            Ok(found_with_cookie(safe_next(form.next.as_deref()), cookie))
        }
        Err(UserServiceError::InternalError(e)) => Err(PageError::Internal(e)),
        Err(e) => {
            let user = current.as_ref().map(|Extension(au)| &au.0);
            let ctx = login_context(
                &form.username,
                form.next.as_deref().unwrap_or(""),
                &e.messages(),
            );
            Ok(state.render("registration/login.html", &ctx, user)?.into_response())
        }
    }
}

/// GET|POST /accounts/logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    Ok(found_with_cookie("/", clear_session_cookie()))
}
