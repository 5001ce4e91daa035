//! Identity provider collaborator.
//!
//! # Architecture
//!
//! Authentication is fully delegated to a hosted identity provider. The
//! [`IdentityProvider`] trait is the seam: the auth session manager is
//! written against it, the production implementation is
//! [`rest::RestIdentityProvider`], and tests use an in-module mock.
//!
//! Auth-state change notifications travel over an explicit
//! `tokio::sync::watch` channel wrapped in [`AuthStateSubscription`], which
//! carries an exactly-once unsubscribe contract.

pub mod rest;

pub use rest::{IdentityBackend, RestIdentityProvider};

use thiserror::Error;
use tokio::sync::watch;
use url::Url;

use wise_launcher_core::UserId;

/// A signed-in principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuthUser {
    /// Opaque provider-issued user id.
    pub uid: UserId,
    /// Email address, when the provider discloses one.
    pub email: Option<String>,
    /// Display name, when the provider discloses one.
    pub display_name: Option<String>,
}

/// The provider's view of the session, as published on the notification
/// channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not yet resolved whether a user is signed in.
    #[default]
    Pending,
    /// Resolved: nobody is signed in.
    SignedOut,
    /// Resolved: this user is signed in.
    SignedIn(AuthUser),
}

/// Errors reported by the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The interactive popup flow was blocked by the user agent.
    #[error("sign-in popup was blocked")]
    PopupBlocked,

    /// The interactive popup flow was dismissed before completing.
    #[error("sign-in popup was cancelled")]
    PopupCancelled,

    /// Wrong email/password combination (or unknown account).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up attempted with an email that already has an account.
    #[error("an account with this email already exists")]
    EmailInUse,

    /// The provider rejected the password at sign-up.
    #[error("password is too weak: {0}")]
    WeakPassword(String),

    /// The redirect completion was rejected (bad or expired state/code).
    #[error("redirect sign-in failed: {0}")]
    RedirectFailed(String),

    /// The provider is not reachable or not configured.
    #[error("authentication service is unavailable")]
    Unavailable,

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a structured error we don't classify further.
    #[error("identity backend error {code}: {message}")]
    Backend { code: String, message: String },

    /// Response body could not be parsed.
    #[error("json parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ProviderError {
    /// True for the popup rejections that trigger the redirect fallback.
    #[must_use]
    pub const fn is_popup_rejection(&self) -> bool {
        matches!(self, Self::PopupBlocked | Self::PopupCancelled)
    }
}

/// A live subscription to the provider's auth-state channel.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// runs the provider's unsubscribe hook exactly once.
pub struct AuthStateSubscription {
    receiver: watch::Receiver<AuthState>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthStateSubscription {
    /// Wrap a watch receiver together with the provider's unsubscribe hook.
    pub fn new(
        receiver: watch::Receiver<AuthState>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// The latest published state, marking it as seen.
    pub fn current(&mut self) -> AuthState {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next emission. Errors when the provider side is gone.
    ///
    /// # Errors
    ///
    /// Returns an error once the sending half has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// Explicitly unsubscribe. Equivalent to dropping the subscription.
    pub fn unsubscribe(mut self) {
        if let Some(hook) = self.unsubscribe.take() {
            hook();
        }
    }
}

impl Drop for AuthStateSubscription {
    fn drop(&mut self) {
        if let Some(hook) = self.unsubscribe.take() {
            hook();
        }
    }
}

/// Seam between the auth session manager and the hosted identity provider.
///
/// All methods surface failures as [`ProviderError`]; none panic. The
/// popup/redirect pair models the provider's two interactive federated
/// flows: the one-shot popup flow, and the full-page redirect flow that is
/// completed by [`consume_redirect_result`](Self::consume_redirect_result)
/// on the next load.
#[allow(async_fn_in_trait)] // callers use concrete providers, not dyn
pub trait IdentityProvider: Send + Sync + 'static {
    /// Subscribe to auth-state change notifications.
    fn subscribe(&self) -> AuthStateSubscription;

    /// Interactive federated sign-in via the popup flow.
    async fn sign_in_popup(&self) -> Result<AuthUser, ProviderError>;

    /// Begin the full-page redirect flow; returns the authorize URL the
    /// caller must navigate to.
    async fn sign_in_redirect(&self) -> Result<Url, ProviderError>;

    /// Consume a pending redirect-flow completion, if one exists.
    async fn consume_redirect_result(&self) -> Result<Option<AuthUser>, ProviderError>;

    /// Password sign-in for an existing account.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ProviderError>;

    /// Create an account with email and password and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    /// Invalidate the provider-side session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_provider_error_display() {
        assert_eq!(
            ProviderError::PopupBlocked.to_string(),
            "sign-in popup was blocked"
        );
        assert_eq!(
            ProviderError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
    }

    #[test]
    fn test_popup_rejection_classification() {
        assert!(ProviderError::PopupBlocked.is_popup_rejection());
        assert!(ProviderError::PopupCancelled.is_popup_rejection());
        assert!(!ProviderError::Unavailable.is_popup_rejection());
        assert!(!ProviderError::InvalidCredentials.is_popup_rejection());
    }

    #[tokio::test]
    async fn test_subscription_unsubscribes_exactly_once() {
        let (tx, rx) = watch::channel(AuthState::Pending);
        let count = Arc::new(AtomicUsize::new(0));

        let hook_count = Arc::clone(&count);
        let subscription =
            AuthStateSubscription::new(rx, move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });

        subscription.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_subscription_drop_unsubscribes() {
        let (tx, rx) = watch::channel(AuthState::Pending);
        let count = Arc::new(AtomicUsize::new(0));

        let hook_count = Arc::clone(&count);
        drop(AuthStateSubscription::new(rx, move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_subscription_sees_emissions() {
        let (tx, rx) = watch::channel(AuthState::Pending);
        let mut subscription = AuthStateSubscription::new(rx, || {});

        assert_eq!(subscription.current(), AuthState::Pending);

        tx.send(AuthState::SignedOut).expect("receiver alive");
        subscription.changed().await.expect("sender alive");
        assert_eq!(subscription.current(), AuthState::SignedOut);
    }
}
