//! Front page

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension,
};
use tera::Context as TeraContext;

use crate::web::middleware::{AppState, AuthenticatedUser};
use crate::web::responses::PageError;

/// GET /
pub async fn home(
    State(state): State<AppState>,
    current: Option<Extension<AuthenticatedUser>>,
) -> Result<Response, PageError> {
    let user = current.as_ref().map(|Extension(au)| &au.0);
    Ok(state.render("home.html", &TeraContext::new(), user)?.into_response())
}

/// Fallback for unmatched paths
pub async fn not_found() -> PageError {
    PageError::NotFound
}
