//! REST client for the hosted identity provider.
//!
//! The provider exposes identity-toolkit style endpoints keyed by the
//! backend API key: `accounts:signInWithPassword`, `accounts:signUp`,
//! `accounts:signInWithProvider` (the popup flow),
//! `accounts:signInWithIdp` (redirect-code exchange) and
//! `accounts:signOut`. Structured errors arrive as
//! `{"error": {"code": ..., "message": "EMAIL_NOT_FOUND"}}` envelopes and
//! are classified into [`ProviderError`] variants.

use std::sync::{Arc, Mutex};

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use wise_launcher_core::UserId;

use crate::config::BackendConfig;
use crate::identity::{AuthState, AuthStateSubscription, AuthUser, IdentityProvider, ProviderError};

/// Length of the `state` token protecting the redirect flow.
const REDIRECT_STATE_LENGTH: usize = 32;

/// Shared connection to the identity backend.
///
/// One backend handle exists per process; per-user provider handles are
/// created from it with [`session`](Self::session).
#[derive(Clone)]
pub struct IdentityBackend {
    inner: Arc<IdentityBackendInner>,
}

struct IdentityBackendInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    provider_id: String,
    callback_url: String,
}

impl IdentityBackend {
    /// Create a backend handle from configuration.
    ///
    /// `launcher_base_url` is the public URL of this server; the federated
    /// redirect flow returns to `{launcher_base_url}/auth/federated/callback`.
    #[must_use]
    pub fn new(config: &BackendConfig, launcher_base_url: &str, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(IdentityBackendInner {
                client,
                base_url: config.identity_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                provider_id: config.federated_provider.clone(),
                callback_url: format!(
                    "{}/auth/federated/callback",
                    launcher_base_url.trim_end_matches('/')
                ),
            }),
        }
    }

    /// Create a per-user provider handle.
    ///
    /// The handle's auth-state channel starts resolved: `SignedIn` when a
    /// persisted principal is supplied, `SignedOut` otherwise.
    #[must_use]
    pub fn session(&self, persisted: Option<AuthUser>) -> RestIdentityProvider {
        let initial = persisted.map_or(AuthState::SignedOut, AuthState::SignedIn);
        let (auth_tx, _) = watch::channel(initial);

        RestIdentityProvider {
            backend: self.clone(),
            state: Arc::new(ProviderState {
                auth_tx,
                pending: Mutex::new(PendingRedirect::None),
            }),
        }
    }

    /// Execute an `accounts:{action}` call and decode the account payload.
    async fn post_account(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<AccountResponse, ProviderError> {
        let url = format!("{}/v1/accounts:{action}", self.inner.base_url);

        let response = self
            .inner
            .client
            .post(&url)
            .query(&[("key", self.inner.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            // Structured provider errors carry a classifying message
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&response_text) {
                return Err(classify_error_message(&envelope.error.message));
            }

            tracing::error!(
                status = %status,
                body = %response_text.chars().take(200).collect::<String>(),
                "Identity backend returned non-success status"
            );
            return Err(ProviderError::Backend {
                code: status.to_string(),
                message: response_text.chars().take(200).collect(),
            });
        }

        Ok(serde_json::from_str(&response_text)?)
    }
}

/// Per-user handle over the identity backend.
///
/// Owns the session's auth-state channel: successful sign-ins and sign-outs
/// performed through this handle are published to every subscriber.
#[derive(Clone)]
pub struct RestIdentityProvider {
    backend: IdentityBackend,
    state: Arc<ProviderState>,
}

struct ProviderState {
    auth_tx: watch::Sender<AuthState>,
    pending: Mutex<PendingRedirect>,
}

enum PendingRedirect {
    None,
    Started { state: String },
    Completed { user: AuthUser },
}

impl RestIdentityProvider {
    fn publish(&self, state: AuthState) {
        // send_replace never fails, even with no live subscribers
        let _previous = self.state.auth_tx.send_replace(state);
    }

    fn current_uid(&self) -> Option<UserId> {
        match &*self.state.auth_tx.borrow() {
            AuthState::SignedIn(user) => Some(user.uid.clone()),
            AuthState::Pending | AuthState::SignedOut => None,
        }
    }

    /// The `state` token of a redirect flow begun on this handle, if any.
    ///
    /// The web layer persists it in the cookie session so the callback can
    /// be validated even when it arrives on a fresh handle.
    #[must_use]
    pub fn pending_redirect_state(&self) -> Option<String> {
        match &*lock_ignoring_poison(&self.state.pending) {
            PendingRedirect::Started { state } => Some(state.clone()),
            PendingRedirect::None | PendingRedirect::Completed { .. } => None,
        }
    }

    /// Exchange an authorization code from the redirect callback.
    ///
    /// The caller is responsible for validating the `state` parameter
    /// against its session before invoking this.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::RedirectFailed` (or a transport error) when
    /// the provider rejects the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_redirect_code(&self, code: &str) -> Result<AuthUser, ProviderError> {
        let account = self
            .backend
            .post_account(
                "signInWithIdp",
                serde_json::json!({
                    "code": code,
                    "providerId": self.backend.inner.provider_id,
                    "requestUri": self.backend.inner.callback_url,
                }),
            )
            .await?;

        let user = account.into_user();
        *lock_ignoring_poison(&self.state.pending) = PendingRedirect::Completed {
            user: user.clone(),
        };
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }
}

impl IdentityProvider for RestIdentityProvider {
    fn subscribe(&self) -> AuthStateSubscription {
        let receiver = self.state.auth_tx.subscribe();
        AuthStateSubscription::new(receiver, || {
            tracing::trace!("auth-state subscription released");
        })
    }

    #[instrument(skip(self))]
    async fn sign_in_popup(&self) -> Result<AuthUser, ProviderError> {
        let account = self
            .backend
            .post_account(
                "signInWithProvider",
                serde_json::json!({
                    "providerId": self.backend.inner.provider_id,
                    "mode": "popup",
                }),
            )
            .await?;

        let user = account.into_user();
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn sign_in_redirect(&self) -> Result<Url, ProviderError> {
        let state = generate_state_token(REDIRECT_STATE_LENGTH);

        let url = Url::parse_with_params(
            &format!("{}/v1/authorize", self.backend.inner.base_url),
            &[
                ("provider_id", self.backend.inner.provider_id.as_str()),
                ("redirect_uri", self.backend.inner.callback_url.as_str()),
                ("state", state.as_str()),
                ("key", self.backend.inner.api_key.expose_secret()),
            ],
        )
        .map_err(|e| ProviderError::RedirectFailed(e.to_string()))?;

        *lock_ignoring_poison(&self.state.pending) = PendingRedirect::Started { state };
        Ok(url)
    }

    async fn consume_redirect_result(&self) -> Result<Option<AuthUser>, ProviderError> {
        let mut pending = lock_ignoring_poison(&self.state.pending);
        if let PendingRedirect::Completed { user } = &*pending {
            let user = user.clone();
            *pending = PendingRedirect::None;
            return Ok(Some(user));
        }
        Ok(None)
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ProviderError> {
        let account = self
            .backend
            .post_account(
                "signInWithPassword",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let user = account.into_user();
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let account = self
            .backend
            .post_account(
                "signUp",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let user = account.into_user();
        self.publish(AuthState::SignedIn(user.clone()));
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), ProviderError> {
        let body = self.current_uid().map_or_else(
            || serde_json::json!({}),
            |uid| serde_json::json!({ "localId": uid }),
        );

        self.backend
            .post_account("signOut", body)
            .await
            .map(|_| ())
            .or_else(|e| match e {
                // The session is gone either way; only transport errors matter
                ProviderError::Backend { .. } => Ok(()),
                other => Err(other),
            })?;

        self.publish(AuthState::SignedOut);
        Ok(())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Account payload returned by every `accounts:*` endpoint.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(rename = "localId", default)]
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
}

impl AccountResponse {
    fn into_user(self) -> AuthUser {
        AuthUser {
            uid: UserId::new(self.local_id),
            email: self.email,
            display_name: self.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a provider error message onto the [`ProviderError`] taxonomy.
fn classify_error_message(message: &str) -> ProviderError {
    match message {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            ProviderError::InvalidCredentials
        }
        "EMAIL_EXISTS" => ProviderError::EmailInUse,
        "POPUP_BLOCKED" => ProviderError::PopupBlocked,
        "POPUP_CANCELLED" | "POPUP_CLOSED_BY_USER" => ProviderError::PopupCancelled,
        "INVALID_OAUTH_STATE" | "INVALID_CODE" | "EXPIRED_OOB_CODE" => {
            ProviderError::RedirectFailed(message.to_string())
        }
        other if other.starts_with("WEAK_PASSWORD") => ProviderError::WeakPassword(
            other
                .split_once(':')
                .map_or("does not meet requirements", |(_, detail)| detail.trim())
                .to_string(),
        ),
        other => ProviderError::Backend {
            code: other.to_string(),
            message: other.to_string(),
        },
    }
}

/// Generate a cryptographically random `state` token.
fn generate_state_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            char::from(*CHARSET.get(idx).unwrap_or(&b'0'))
        })
        .collect()
}

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_credentials_errors() {
        assert!(matches!(
            classify_error_message("EMAIL_NOT_FOUND"),
            ProviderError::InvalidCredentials
        ));
        assert!(matches!(
            classify_error_message("INVALID_PASSWORD"),
            ProviderError::InvalidCredentials
        ));
        assert!(matches!(
            classify_error_message("EMAIL_EXISTS"),
            ProviderError::EmailInUse
        ));
    }

    #[test]
    fn test_classify_popup_rejections() {
        assert!(classify_error_message("POPUP_BLOCKED").is_popup_rejection());
        assert!(classify_error_message("POPUP_CLOSED_BY_USER").is_popup_rejection());
    }

    #[test]
    fn test_classify_weak_password_detail() {
        let err = classify_error_message("WEAK_PASSWORD : Password should be at least 6 characters");
        match err {
            ProviderError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters");
            }
            other => panic!("expected WeakPassword, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_falls_back_to_backend() {
        assert!(matches!(
            classify_error_message("QUOTA_EXCEEDED"),
            ProviderError::Backend { .. }
        ));
    }

    #[test]
    fn test_generate_state_token_length_and_charset() {
        let token = generate_state_token(32);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_session_starts_resolved() {
        let config = BackendConfig {
            project: "wise-test".to_string(),
            api_key: SecretString::from("k9Qz!mP2@vL5#xR8"),
            identity_url: "https://identity.wiseapps.dev/wise-test".to_string(),
            store_url: "https://store.wiseapps.dev/wise-test".to_string(),
            federated_provider: "google.com".to_string(),
        };
        let backend = IdentityBackend::new(&config, "http://localhost:3000", reqwest::Client::new());

        let mut anonymous = backend.session(None).subscribe();
        assert_eq!(anonymous.current(), AuthState::SignedOut);

        let user = AuthUser {
            uid: UserId::new("u-1"),
            email: Some("user@example.com".to_string()),
            display_name: None,
        };
        let mut restored = backend.session(Some(user.clone())).subscribe();
        assert_eq!(restored.current(), AuthState::SignedIn(user));
    }

    #[tokio::test]
    async fn test_redirect_state_is_tracked_until_consumed() {
        let config = BackendConfig {
            project: "wise-test".to_string(),
            api_key: SecretString::from("k9Qz!mP2@vL5#xR8"),
            identity_url: "https://identity.wiseapps.dev/wise-test".to_string(),
            store_url: "https://store.wiseapps.dev/wise-test".to_string(),
            federated_provider: "google.com".to_string(),
        };
        let backend = IdentityBackend::new(&config, "http://localhost:3000", reqwest::Client::new());
        let provider = backend.session(None);

        assert!(provider.pending_redirect_state().is_none());

        let url = provider.sign_in_redirect().await.expect("authorize url");
        let state = provider
            .pending_redirect_state()
            .expect("pending state recorded");
        assert!(url.query().is_some_and(|q| q.contains(&state)));

        // Nothing completed yet
        let result = provider.consume_redirect_result().await.expect("consume");
        assert!(result.is_none());
    }
}
