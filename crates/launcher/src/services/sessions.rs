//! Per-user session-handle registry.
//!
//! Each signed-in user gets one long-lived handle pairing an auth session
//! manager with a shopping-list controller. Handles live in a bounded moka
//! cache with an idle TTL; eviction (idle, capacity, or explicit logout)
//! shuts the auth manager down, which tears down its auth-state
//! subscription exactly once. An evicted pantry controller is simply
//! rebuilt and reloaded on the user's next request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

use wise_launcher_core::UserId;

use crate::models::CurrentUser;
use crate::services::auth::AuthSessionManager;
use crate::services::pantry::ShoppingListController;
use crate::state::BackendHandles;
use crate::{identity::RestIdentityProvider, store::RestItemStore};

/// Maximum number of live user handles.
const SESSION_CAPACITY: u64 = 10_000;

/// Idle time before a handle is evicted (30 minutes).
const SESSION_IDLE_SECONDS: u64 = 30 * 60;

/// One signed-in user's long-lived state.
pub struct UserSession {
    auth: AuthSessionManager<RestIdentityProvider>,
    pantry: Mutex<ShoppingListController<RestItemStore>>,
}

impl UserSession {
    /// The user's auth session manager.
    #[must_use]
    pub const fn auth(&self) -> &AuthSessionManager<RestIdentityProvider> {
        &self.auth
    }

    /// The user's shopping-list controller.
    ///
    /// Operations lock the controller, serializing them per user.
    #[must_use]
    pub const fn pantry(&self) -> &Mutex<ShoppingListController<RestItemStore>> {
        &self.pantry
    }
}

/// Registry of per-user session handles.
pub struct SessionRegistry {
    cache: Cache<UserId, Arc<UserSession>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(SESSION_CAPACITY)
            .time_to_idle(Duration::from_secs(SESSION_IDLE_SECONDS))
            .eviction_listener(|_uid, session: Arc<UserSession>, _cause| {
                session.auth().shutdown();
            })
            .build();

        Self { cache }
    }

    /// Get the user's handle, creating it on first access.
    ///
    /// A created handle seeds its provider session from the cookie-persisted
    /// principal, so the manager's auth-state channel starts resolved.
    pub async fn get_or_create(
        &self,
        backend: &BackendHandles,
        user: &CurrentUser,
    ) -> Arc<UserSession> {
        let backend = backend.clone();
        let auth_user = user.to_auth_user();

        self.cache
            .get_with(user.uid.clone(), async move {
                let provider = backend.identity().session(Some(auth_user));
                let auth = AuthSessionManager::start(provider).await;
                let pantry = Mutex::new(ShoppingListController::new(backend.store().clone()));
                Arc::new(UserSession { auth, pantry })
            })
            .await
    }

    /// Drop the user's handle, shutting its auth manager down.
    pub async fn invalidate(&self, uid: &UserId) {
        if let Some(session) = self.cache.get(uid).await {
            session.auth().shutdown();
        }
        self.cache.invalidate(uid).await;
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
