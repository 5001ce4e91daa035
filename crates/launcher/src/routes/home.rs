//! Launcher home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use crate::filters;
use crate::middleware::OptionalAuth;
use crate::registry::AppEntry;
use crate::state::AppState;

/// Launcher page template: one card per registered application.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    /// Registered applications, in display order.
    pub apps: Vec<AppEntry>,
    /// Header label for the signed-in user.
    pub user_label: String,
    /// Degraded-mode banner, when backend services are unavailable.
    pub unavailable: Option<String>,
}

/// Display the launcher grid.
///
/// Gated on a signed-in user; anonymous visitors go to the login page.
#[instrument(skip(state, auth))]
pub async fn home(State(state): State<AppState>, auth: OptionalAuth) -> Response {
    let OptionalAuth(user) = auth;
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };

    HomeTemplate {
        apps: state.registry().entries().to_vec(),
        user_label: user.label(),
        unavailable: state.unavailable_reason().map(|_| {
            "Services are temporarily unavailable. Some applications may not work.".to_string()
        }),
    }
    .into_response()
}
