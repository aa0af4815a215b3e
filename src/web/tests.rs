//! Router tests
//!
//! Each test builds the full router over a fresh in-memory database and
//! drives it with `tower::ServiceExt::oneshot`.

use super::*;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

use crate::config::SessionConfig;
use crate::db::repositories::{
    ArticleRepository, CommentRepository, CommentRepositoryImpl, SqlxArticleRepository,
};
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::{Article, CreateCommentInput};
use crate::services::{LoginInput, RegisterInput};
use crate::theme::ThemeEngine;

const PASSWORD: &str = "secret-pass-42";

struct TestApp {
    router: Router,
    state: AppState,
    pool: DynDatabasePool,
}

impl TestApp {
    async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let theme = ThemeEngine::embedded().expect("templates load");
        let state = AppState::new(pool.clone(), SessionConfig::default(), "Newspaper", theme);

        Self {
            router: build_router(state.clone()),
            state,
            pool,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Register `username` and return a `Cookie` header value for a session
    async fn login_as(&self, username: &str) -> (i64, String) {
        let user = self
            .state
            .user_service
            .register(RegisterInput::new(username, PASSWORD))
            .await
            .expect("register");
        let session = self
            .state
            .user_service
            .login(LoginInput::new(username, PASSWORD))
            .await
            .expect("login");
        (user.id, format!("session={}", session.id))
    }

    async fn create_article(&self, author_id: i64) -> Article {
        SqlxArticleRepository::new(self.pool.clone())
            .create(&Article::new(
                "A good title".into(),
                "Nice body content".into(),
                author_id,
            ))
            .await
            .expect("create article")
    }

    fn articles(&self) -> SqlxArticleRepository {
        SqlxArticleRepository::new(self.pool.clone())
    }
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn set_cookie(response: &Response) -> &str {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

// ============================================================================
// Login gate
// ============================================================================

#[tokio::test]
async fn test_anonymous_article_pages_redirect_to_login() {
    let app = TestApp::new().await;

    for (uri, encoded) in [
        ("/articles/", "%2Farticles%2F"),
        ("/articles/1/", "%2Farticles%2F1%2F"),
        ("/articles/new/", "%2Farticles%2Fnew%2F"),
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{}", uri);
        assert_eq!(
            location(&response),
            format!("/accounts/login/?next={}", encoded)
        );
    }
}

#[tokio::test]
async fn test_anonymous_post_is_not_applied() {
    let app = TestApp::new().await;
    let (user_id, _) = app.login_as("testuser").await;
    let article = app.create_article(user_id).await;

    let response = app
        .post_form(&format!("/articles/{}/delete/", article.id), "", None)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/accounts/login/"));
    assert!(app.articles().get_by_id(article.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_bogus_cookie_is_anonymous() {
    let app = TestApp::new().await;
    let response = app.get("/articles/", Some("session=not-a-real-token")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

// ============================================================================
// Articles
// ============================================================================

#[tokio::test]
async fn test_article_list_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    app.create_article(user_id).await;

    let response = app.get("/articles/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Nice body content"));
    assert!(body.contains("testuser"));
}

#[tokio::test]
async fn test_article_detail_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    let article = app.create_article(user_id).await;
    assert_eq!(article.to_string(), "A good title");
    assert_eq!(article.absolute_url(), "/articles/1/");

    let response = app.get("/articles/1/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("A good title"));

    let missing = app.get("/articles/100000/", Some(&cookie)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(body_string(missing).await.contains("404"));

    let junk = app.get("/articles/abc/", Some(&cookie)).await;
    assert_eq!(junk.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_detail_shows_existing_comment() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    let article = app.create_article(user_id).await;

    CommentRepositoryImpl::new(app.pool.clone())
        .create(&CreateCommentInput {
            article_id: article.id,
            author_id: user_id,
            comment: "This is a comment.".into(),
        })
        .await
        .unwrap();

    let response = app.get(&article.absolute_url(), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("This is a comment."));
}

#[tokio::test]
async fn test_post_comment_from_detail_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    let article = app.create_article(user_id).await;

    let response = app
        .post_form(
            "/articles/1/",
            "comment=This+is+a+comment+from+the+view.",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/articles/1/");

    let comments = CommentRepositoryImpl::new(app.pool.clone())
        .list_by_article(article.id)
        .await
        .unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.comment, "This is a comment from the view.");
    assert_eq!(comments[0].comment.author_id, user_id);
}

#[tokio::test]
async fn test_invalid_comment_rerenders_detail() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    let article = app.create_article(user_id).await;

    let response = app.post_form("/articles/1/", "comment=+++", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Comment cannot be empty."));

    let too_long = format!("comment={}", "x".repeat(141));
    let response = app.post_form("/articles/1/", &too_long, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let comments = CommentRepositoryImpl::new(app.pool.clone())
        .list_by_article(article.id)
        .await
        .unwrap();
    assert!(comments.is_empty());
}

#[tokio::test]
async fn test_comment_on_missing_article_is_404() {
    let app = TestApp::new().await;
    let (_, cookie) = app.login_as("testuser").await;

    let response = app
        .post_form("/articles/100000/", "comment=hello", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_create_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    let (other_id, _) = app.login_as("someoneelse").await;

    let form_page = app.get("/articles/new/", Some(&cookie)).await;
    assert_eq!(form_page.status(), StatusCode::OK);

    let response = app
        .post_form(
            "/articles/new/",
            &format!("title=New+title&body=New+text&author={}", other_id),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let latest = app
        .articles()
        .list_with_authors()
        .await
        .unwrap()
        .pop()
        .expect("an article");
    assert_eq!(latest.0.title, "New title");
    assert_eq!(latest.0.body, "New text");
    assert_eq!(latest.0.author_id, user_id, "submitted author is ignored");
    assert_eq!(location(&response), latest.0.absolute_url());
}

#[tokio::test]
async fn test_article_create_invalid_rerenders() {
    let app = TestApp::new().await;
    let (_, cookie) = app.login_as("testuser").await;

    let response = app
        .post_form("/articles/new/", "title=&body=Some+text", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Title is required."));
    assert!(body.contains("Some text"), "entered body is kept");
    assert!(app.articles().list_with_authors().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_article_update_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    app.create_article(user_id).await;

    let form_page = app.get("/articles/1/edit/", Some(&cookie)).await;
    assert_eq!(form_page.status(), StatusCode::OK);
    assert!(body_string(form_page).await.contains("A good title"));

    let response = app
        .post_form(
            "/articles/1/edit/",
            "title=Updated+title&body=Updated+text",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/articles/1/");

    let article = app.articles().get_by_id(1).await.unwrap().unwrap();
    assert_eq!(article.title, "Updated title");
    assert_eq!(article.body, "Updated text");
}

#[tokio::test]
async fn test_article_delete_view() {
    let app = TestApp::new().await;
    let (user_id, cookie) = app.login_as("testuser").await;
    app.create_article(user_id).await;

    let confirm = app.get("/articles/1/delete/", Some(&cookie)).await;
    assert_eq!(confirm.status(), StatusCode::OK);
    assert!(body_string(confirm).await.contains("Are you sure"));

    let response = app.post_form("/articles/1/delete/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/articles/");
    assert!(app.articles().get_by_id(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_author_cannot_edit_or_delete() {
    let app = TestApp::new().await;
    let (author_id, _) = app.login_as("testuser").await;
    let (_, intruder) = app.login_as("intruder").await;
    app.create_article(author_id).await;

    for uri in ["/articles/1/edit/", "/articles/1/delete/"] {
        let response = app.get(uri, Some(&intruder)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "GET {}", uri);
    }

    let response = app
        .post_form("/articles/1/edit/", "title=Mine&body=Now", Some(&intruder))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_form("/articles/1/delete/", "", Some(&intruder)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("permission"));

    let article = app.articles().get_by_id(1).await.unwrap().unwrap();
    assert_eq!(article.title, "A good title");
}

#[tokio::test]
async fn test_edit_missing_article_is_404() {
    let app = TestApp::new().await;
    let (_, cookie) = app.login_as("testuser").await;

    let response = app.get("/articles/100000/edit/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_signup_login_logout_roundtrip() {
    let app = TestApp::new().await;

    let form = app.get("/accounts/signup/", None).await;
    assert_eq!(form.status(), StatusCode::OK);

    let response = app
        .post_form(
            "/accounts/signup/",
            "username=newuser&email=new%40email.com&age=30&password1=secret-pass-42&password2=secret-pass-42",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/accounts/login/");

    let response = app
        .post_form(
            "/accounts/login/",
            "username=newuser&password=secret-pass-42",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let cookie_header = set_cookie(&response).to_string();
    assert!(cookie_header.starts_with("session="));
    assert!(cookie_header.contains("HttpOnly"));
    assert!(cookie_header.contains("SameSite=Lax"));
    let cookie = cookie_header
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();

    let list = app.get("/articles/", Some(&cookie)).await;
    assert_eq!(list.status(), StatusCode::OK);

    let response = app.post_form("/accounts/logout/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let after = app.get("/articles/", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_logout_requires_login() {
    let app = TestApp::new().await;
    let response = app.get("/accounts/logout/", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/accounts/login/?next="));
}

#[tokio::test]
async fn test_invalid_signup_rerenders_without_saving() {
    let app = TestApp::new().await;

    let response = app
        .post_form(
            "/accounts/signup/",
            "username=bad+name&email=nope&password1=123&password2=123",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Enter a valid username."));
    assert!(body.contains("Enter a valid email address."));
    assert!(body.contains("This password is too short."));
    assert!(body.contains("value=\"nope\""), "entered email is kept");

    let login = app
        .post_form("/accounts/login/", "username=bad+name&password=123", None)
        .await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_signup_rerenders() {
    let app = TestApp::new().await;
    app.login_as("taken").await;

    let response = app
        .post_form(
            "/accounts/signup/",
            "username=taken&password1=secret-pass-42&password2=secret-pass-42",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response)
        .await
        .contains("A user with that username already exists."));
}

#[tokio::test]
async fn test_login_with_bad_credentials() {
    let app = TestApp::new().await;
    app.login_as("testuser").await;

    let response = app
        .post_form(
            "/accounts/login/",
            "username=testuser&password=wrong-password",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_empty());
    assert!(body_string(response)
        .await
        .contains("Please enter a correct username and password."));
}

#[tokio::test]
async fn test_login_follows_local_next_only() {
    let app = TestApp::new().await;
    app.login_as("testuser").await;

    let page = app.get("/accounts/login/?next=%2Farticles%2F1%2F", None).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_string(page).await.contains("value=\"&#x2F;articles&#x2F;1&#x2F;\""));

    let response = app
        .post_form(
            "/accounts/login/",
            "username=testuser&password=secret-pass-42&next=%2Farticles%2F1%2F",
            None,
        )
        .await;
    assert_eq!(location(&response), "/articles/1/");

    let response = app
        .post_form(
            "/accounts/login/",
            "username=testuser&password=secret-pass-42&next=%2F%2Fevil.example%2F",
            None,
        )
        .await;
    assert_eq!(location(&response), "/");

    let response = app
        .post_form(
            "/accounts/login/",
            "username=testuser&password=secret-pass-42&next=%2F%09%2Fevil.example%2F",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

// ============================================================================
// Home and fallbacks
// ============================================================================

#[tokio::test]
async fn test_home_page_public_and_personal() {
    let app = TestApp::new().await;

    let anonymous = app.get("/", None).await;
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert!(body_string(anonymous).await.contains("You are not logged in"));

    let (_, cookie) = app.login_as("testuser").await;
    let personal = app.get("/", Some(&cookie)).await;
    assert!(body_string(personal).await.contains("Hi testuser!"));
}

#[tokio::test]
async fn test_unknown_path_renders_error_page() {
    let app = TestApp::new().await;
    let response = app.get("/no/such/page/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_string(response).await;
    assert!(body.contains("Newspaper"), "rendered with the site layout");
    assert!(body.contains("does not exist"));
}
