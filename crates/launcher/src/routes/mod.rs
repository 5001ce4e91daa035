//! HTTP route handlers for the launcher.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                        - Launcher grid (requires sign-in)
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (503 when degraded)
//!
//! # Auth
//! GET  /login                   - Combined sign-in / sign-up page
//! POST /auth/login              - Password sign-in
//! POST /auth/register           - Account creation
//! GET  /auth/federated          - Federated sign-in (popup, redirect fallback)
//! GET  /auth/federated/callback - Complete the redirect flow
//! POST /auth/logout             - Sign out
//!
//! # WisePantry (HTMX fragments)
//! GET  /pantry                  - Shopping-list page
//! POST /pantry/add              - Add item (returns grouped-list fragment)
//! POST /pantry/toggle           - Toggle purchased (fragment)
//! POST /pantry/quantity         - Change quantity (fragment)
//! POST /pantry/delete           - Delete item (fragment)
//! ```

pub mod auth;
pub mod home;
pub mod pantry;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/federated", get(auth::federated))
        .route("/federated/callback", get(auth::federated_callback))
        .route("/logout", post(auth::logout))
}

/// Create the pantry routes router.
pub fn pantry_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pantry::show))
        .route("/add", post(pantry::add))
        .route("/toggle", post(pantry::toggle))
        .route("/quantity", post(pantry::quantity))
        .route("/delete", post(pantry::delete))
}

/// Create all application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Launcher grid
        .route("/", get(home::home))
        // Login page
        .route("/login", get(auth::login_page))
        // Auth actions
        .nest("/auth", auth_routes())
        // WisePantry
        .nest("/pantry", pantry_routes())
}

/// Assemble the full application: routes, health endpoints, static files,
/// and the session layer.
pub fn app(state: AppState) -> Router {
    let session_layer = crate::middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service("/static", ServeDir::new("crates/launcher/static"))
        .layer(session_layer)
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable while backend services are in the
/// degraded state.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backend() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
