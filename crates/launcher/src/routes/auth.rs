//! Authentication route handlers.
//!
//! Sign-in is fully delegated to the hosted identity provider. The login
//! page combines email/password sign-in, account creation, and federated
//! sign-in; the federated flow runs popup-first with a full-page redirect
//! fallback completed by the callback handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::{AuthSessionManager, FederatedSignIn};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display on the login page.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    /// `signup` switches the form into account-creation mode.
    pub mode: Option<String>,
}

/// Query parameters from the federated redirect callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for a sign-in.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    /// True when the form is in account-creation mode.
    pub signup: bool,
}

// =============================================================================
// Login Page
// =============================================================================

/// Display the login page.
#[instrument(skip(state, session, auth))]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    let OptionalAuth(user) = auth;
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    // One-shot flash message from a failed action, else a query code
    let flash: Option<String> = session
        .remove(session_keys::AUTH_FLASH)
        .await
        .ok()
        .flatten();
    let error = flash
        .or_else(|| query.error.as_deref().map(describe_error_code))
        .or_else(|| {
            state
                .unavailable_reason()
                .map(|_| "Services are temporarily unavailable. Please try again later.".to_string())
        });

    LoginTemplate {
        error,
        success: query.success.as_deref().map(describe_success_code),
        signup: query.mode.as_deref() == Some("signup"),
    }
    .into_response()
}

/// Map a short query code to its login-page message.
fn describe_error_code(code: &str) -> String {
    match code {
        "denied" => "Sign-in was denied by the provider.".to_string(),
        "missing_code" | "missing_state" | "invalid_state" | "token_exchange" => {
            "Redirect sign-in failed. Please try again.".to_string()
        }
        _ => "Sign-in failed. Please try again.".to_string(),
    }
}

/// Map a short query code to its login-page success message.
fn describe_success_code(code: &str) -> String {
    match code {
        "signed_out" => "You have been signed out.".to_string(),
        _ => "Done.".to_string(),
    }
}

/// Stash a one-shot error message and bounce back to the login page.
async fn flash_and_redirect(
    session: &Session,
    message: String,
    target: &str,
) -> Result<Response> {
    session.insert(session_keys::AUTH_FLASH, message).await?;
    Ok(Redirect::to(target).into_response())
}

/// Persist the signed-in principal and land on the launcher.
async fn complete_sign_in(session: &Session, user: CurrentUser) -> Result<Response> {
    set_current_user(session, &user).await?;
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Password Routes
// =============================================================================

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(e) => return flash_and_redirect(&session, e.to_string(), "/login").await,
    };

    let manager = AuthSessionManager::start(backend.identity().session(None)).await;

    if manager.sign_in_with_password(&form.email, &form.password).await {
        match manager.current_user() {
            Some(user) => complete_sign_in(&session, user.into()).await,
            None => Err(AppError::Internal(
                "sign-in reported success without a user".to_string(),
            )),
        }
    } else {
        let message = manager
            .last_error()
            .unwrap_or_else(|| "Sign-in failed. Please try again.".to_string());
        flash_and_redirect(&session, message, "/login").await
    }
}

/// Handle registration form submission.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(e) => return flash_and_redirect(&session, e.to_string(), "/login?mode=signup").await,
    };

    let manager = AuthSessionManager::start(backend.identity().session(None)).await;

    if manager.sign_up(&form.email, &form.password).await {
        match manager.current_user() {
            Some(user) => complete_sign_in(&session, user.into()).await,
            None => Err(AppError::Internal(
                "sign-up reported success without a user".to_string(),
            )),
        }
    } else {
        let message = manager
            .last_error()
            .unwrap_or_else(|| "Sign-up failed. Please try again.".to_string());
        flash_and_redirect(&session, message, "/login?mode=signup").await
    }
}

// =============================================================================
// Federated Routes
// =============================================================================

/// Run the federated sign-in flow: popup first, redirect fallback.
///
/// # Route
///
/// `GET /auth/federated`
#[instrument(skip(state, session))]
pub async fn federated(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response> {
    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(e) => return flash_and_redirect(&session, e.to_string(), "/login").await,
    };

    let provider = backend.identity().session(None);
    let manager = AuthSessionManager::start(provider.clone()).await;

    match manager.sign_in_with_federated_provider().await {
        FederatedSignIn::Completed(user) => complete_sign_in(&session, user.into()).await,
        FederatedSignIn::RedirectStarted(url) => {
            // Store the state token for validation on callback (one-time use)
            if let Some(state_token) = provider.pending_redirect_state() {
                session
                    .insert(session_keys::FEDERATED_STATE, &state_token)
                    .await?;
            }
            Ok(Redirect::to(url.as_str()).into_response())
        }
        FederatedSignIn::Failed => {
            let message = manager
                .last_error()
                .unwrap_or_else(|| "Sign-in failed. Please try again.".to_string());
            flash_and_redirect(&session, message, "/login").await
        }
    }
}

/// Complete the federated redirect flow.
///
/// Validates the state parameter against the session, exchanges the
/// authorization code, and signs the user in.
///
/// # Route
///
/// `GET /auth/federated/callback`
#[instrument(skip(state, session, query))]
pub async fn federated_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    // Check for errors reported by the provider
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!("Federated sign-in error: {error} - {description}");
        return Ok(Redirect::to("/login?error=denied").into_response());
    }

    // Verify we have an authorization code
    let Some(code) = query.code else {
        tracing::warn!("Federated callback missing code");
        return Ok(Redirect::to("/login?error=missing_code").into_response());
    };

    // Verify state parameter (CSRF protection)
    let Some(returned_state) = query.state else {
        tracing::warn!("Federated callback missing state");
        return Ok(Redirect::to("/login?error=missing_state").into_response());
    };

    let stored_state: Option<String> = session
        .get(session_keys::FEDERATED_STATE)
        .await
        .ok()
        .flatten();

    if stored_state.as_ref() != Some(&returned_state) {
        tracing::warn!("Federated callback state mismatch");
        return Ok(Redirect::to("/login?error=invalid_state").into_response());
    }

    // Clear the stored state (one-time use)
    session
        .remove::<String>(session_keys::FEDERATED_STATE)
        .await?;

    let backend = match state.backend() {
        Ok(backend) => backend,
        Err(e) => return flash_and_redirect(&session, e.to_string(), "/login").await,
    };

    // Exchange the code for a signed-in principal
    match backend
        .identity()
        .session(None)
        .exchange_redirect_code(&code)
        .await
    {
        Ok(user) => complete_sign_in(&session, user.into()).await,
        Err(e) => {
            tracing::error!("Failed to exchange federated redirect code: {e}");
            Ok(Redirect::to("/login?error=token_exchange").into_response())
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out: invalidate the provider session, drop the user's handle,
/// clear the cookie session, and land on the login page.
///
/// # Route
///
/// `POST /auth/logout`
#[instrument(skip(state, session, auth))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Response {
    let OptionalAuth(user) = auth;

    if let (Ok(backend), Some(user)) = (state.backend(), user) {
        let handle = state.sessions().get_or_create(backend, &user).await;
        if !handle.auth().sign_out().await {
            tracing::warn!("Provider sign-out failed; clearing local session anyway");
        }
        state.sessions().invalidate(&user.uid).await;
    }

    // Best effort: the user is leaving either way
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }

    Redirect::to("/login?success=signed_out").into_response()
}
