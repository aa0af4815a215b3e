//! Web layer - HTML pages and routing
//!
//! This module contains every page of the site:
//! - Front page
//! - Account pages (sign-up, login, logout)
//! - Article pages (list, detail with comments, create, edit, delete)
//! - Error pages rendered from the site templates

pub mod accounts;
pub mod articles;
pub mod home;
pub mod middleware;
pub mod responses;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use middleware::{AppState, AuthenticatedUser};
pub use responses::PageError;

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    // Pages that need a logged-in user
    let protected_routes = Router::new()
        .route(
            "/accounts/logout/",
            get(accounts::logout).post(accounts::logout),
        )
        .route("/articles/", get(articles::list))
        .route("/articles/new/", get(articles::new_form).post(articles::create))
        .route("/articles/{id}/", get(articles::detail).post(articles::add_comment))
        .route(
            "/articles/{id}/edit/",
            get(articles::edit_form).post(articles::update),
        )
        .route(
            "/articles/{id}/delete/",
            get(articles::delete_form).post(articles::delete),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    // Public routes
    Router::new()
        .route("/", get(home::home))
        .route(
            "/accounts/signup/",
            get(accounts::signup_form).post(accounts::signup),
        )
        .route(
            "/accounts/login/",
            get(accounts::login_form).post(accounts::login),
        )
        .merge(protected_routes)
        .fallback(home::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Session lookup runs before error pages so they can show the user
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::load_session,
                ))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::render_error_pages,
                )),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
