//! Auth session manager.
//!
//! Wraps the identity provider for one user session: tracks the current
//! user, a loading flag, and a displayable error field; runs the federated
//! popup flow with its redirect fallback; and owns the session's
//! subscription to the provider's auth-state channel.
//!
//! Actions never return provider errors across this boundary. They report
//! success as a value and record failures in the error field, already
//! mapped to a user-displayable string.

use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;
use url::Url;

use wise_launcher_core::Email;

use crate::identity::{AuthState, AuthUser, IdentityProvider, ProviderError};

/// Outcome of the federated sign-in flow.
#[derive(Debug)]
pub enum FederatedSignIn {
    /// The popup flow completed; the caller should navigate to the default
    /// view.
    Completed(AuthUser),
    /// The popup was blocked or cancelled and the redirect fallback began;
    /// the caller must navigate to this URL.
    RedirectStarted(Url),
    /// Sign-in failed; the error field holds the message.
    Failed,
}

#[derive(Default)]
struct Snapshot {
    user: Option<AuthUser>,
    loading: bool,
    error: Option<String>,
}

/// Session-scoped wrapper over an identity provider.
pub struct AuthSessionManager<P> {
    provider: P,
    shared: Arc<RwLock<Snapshot>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<P: IdentityProvider> AuthSessionManager<P> {
    /// Start a manager over the given provider.
    ///
    /// Subscribes exactly once to the provider's auth-state channel: every
    /// emission, including the initial "unknown yet" resolution, updates
    /// the current user and clears the loading flag. Also checks for a
    /// pending redirect-flow completion exactly once; a pending completion
    /// is treated as a successful sign-in.
    pub async fn start(provider: P) -> Self {
        let shared = Arc::new(RwLock::new(Snapshot {
            user: None,
            loading: true,
            error: None,
        }));

        let mut subscription = provider.subscribe();

        // Seed from whatever the channel already resolved to.
        apply_state(&shared, subscription.current());

        let listener_shared = Arc::clone(&shared);
        let listener = tokio::spawn(async move {
            // The subscription is dropped (and thereby unsubscribed) when
            // this task ends or is aborted.
            while subscription.changed().await.is_ok() {
                apply_state(&listener_shared, subscription.current());
            }
        });

        let manager = Self {
            provider,
            shared,
            listener: Mutex::new(Some(listener)),
        };

        // Pending redirect completion, checked exactly once at start.
        match manager.provider.consume_redirect_result().await {
            Ok(Some(user)) => {
                let mut snapshot = manager.write();
                snapshot.user = Some(user);
                snapshot.loading = false;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to consume redirect result: {e}");
                let mut snapshot = manager.write();
                snapshot.error = Some(display_error(&e));
                snapshot.loading = false;
            }
        }

        manager
    }

    /// The signed-in user, if the session has one.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.read().user.clone()
    }

    /// True until the provider has resolved the session state.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// The displayable message from the most recent failed action.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.read().error.clone()
    }

    /// Federated sign-in: popup first, redirect fallback on popup
    /// rejection.
    ///
    /// Any non-rejection popup failure is recorded and does not fall back.
    /// A redirect-flow failure is recorded as well; in both cases loading
    /// resolves to false.
    pub async fn sign_in_with_federated_provider(&self) -> FederatedSignIn {
        self.begin_action();

        match self.provider.sign_in_popup().await {
            Ok(user) => {
                self.finish_signed_in(user.clone());
                FederatedSignIn::Completed(user)
            }
            Err(popup_error) if popup_error.is_popup_rejection() => {
                tracing::debug!("Popup rejected ({popup_error}), falling back to redirect");
                match self.provider.sign_in_redirect().await {
                    // Loading intentionally stays set: the page is about to
                    // navigate away to the provider.
                    Ok(url) => FederatedSignIn::RedirectStarted(url),
                    Err(redirect_error) => {
                        self.finish_failed(&redirect_error);
                        FederatedSignIn::Failed
                    }
                }
            }
            Err(other) => {
                self.finish_failed(&other);
                FederatedSignIn::Failed
            }
        }
    }

    /// Password sign-in. Returns whether the session is now signed in.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> bool {
        self.begin_action();

        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(e) => {
                let mut snapshot = self.write();
                snapshot.error = Some(e.to_string());
                snapshot.loading = false;
                return false;
            }
        };

        match self
            .provider
            .sign_in_with_password(email.as_str(), password)
            .await
        {
            Ok(user) => {
                self.finish_signed_in(user);
                true
            }
            Err(e) => {
                self.finish_failed(&e);
                false
            }
        }
    }

    /// Account creation. Returns whether the session is now signed in.
    pub async fn sign_up(&self, email: &str, password: &str) -> bool {
        self.begin_action();

        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(e) => {
                let mut snapshot = self.write();
                snapshot.error = Some(e.to_string());
                snapshot.loading = false;
                return false;
            }
        };

        match self.provider.sign_up(email.as_str(), password).await {
            Ok(user) => {
                self.finish_signed_in(user);
                true
            }
            Err(e) => {
                self.finish_failed(&e);
                false
            }
        }
    }

    /// Invalidate the provider session and clear the local user.
    pub async fn sign_out(&self) -> bool {
        self.begin_action();

        match self.provider.sign_out().await {
            Ok(()) => {
                let mut snapshot = self.write();
                snapshot.user = None;
                snapshot.loading = false;
                true
            }
            Err(e) => {
                tracing::error!("Sign out failed: {e}");
                self.finish_failed(&e);
                false
            }
        }
    }

    /// Tear down the auth-state subscription.
    ///
    /// Idempotent; aborting the listener task drops the subscription, which
    /// runs the provider's unsubscribe hook exactly once. Also invoked from
    /// `Drop` and from session-registry eviction.
    pub fn shutdown(&self) {
        let handle = lock_ignoring_poison(&self.listener).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn begin_action(&self) {
        let mut snapshot = self.write();
        snapshot.error = None;
        snapshot.loading = true;
    }

    fn finish_signed_in(&self, user: AuthUser) {
        let mut snapshot = self.write();
        snapshot.user = Some(user);
        snapshot.loading = false;
    }

    fn finish_failed(&self, error: &ProviderError) {
        let mut snapshot = self.write();
        snapshot.error = Some(display_error(error));
        snapshot.loading = false;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.shared
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.shared
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<P> Drop for AuthSessionManager<P> {
    fn drop(&mut self) {
        let handle = lock_ignoring_poison(&self.listener).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Fold an auth-state emission into the shared snapshot.
fn apply_state(shared: &RwLock<Snapshot>, state: AuthState) {
    let mut snapshot = shared
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    match state {
        // Still unresolved; keep loading.
        AuthState::Pending => {}
        AuthState::SignedOut => {
            snapshot.user = None;
            snapshot.loading = false;
        }
        AuthState::SignedIn(user) => {
            snapshot.user = Some(user);
            snapshot.loading = false;
        }
    }
}

/// Map a provider failure to the string shown to the user.
fn display_error(error: &ProviderError) -> String {
    match error {
        ProviderError::Unavailable | ProviderError::Http(_) => {
            "Authentication service is not available.".to_string()
        }
        ProviderError::InvalidCredentials => "Invalid email or password.".to_string(),
        ProviderError::EmailInUse => {
            "An account with this email already exists.".to_string()
        }
        ProviderError::WeakPassword(detail) => format!("Password is too weak: {detail}"),
        ProviderError::PopupBlocked | ProviderError::PopupCancelled => {
            "Sign-in was interrupted. Please try again.".to_string()
        }
        ProviderError::RedirectFailed(detail) => format!("Redirect sign-in failed: {detail}"),
        ProviderError::Backend { .. } | ProviderError::Parse(_) => {
            "Sign-in failed. Please try again.".to_string()
        }
    }
}

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
