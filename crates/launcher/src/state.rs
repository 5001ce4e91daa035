//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{BackendConfig, ConfigError, LauncherConfig};
use crate::error::AppError;
use crate::identity::IdentityBackend;
use crate::registry::AppRegistry;
use crate::services::sessions::SessionRegistry;
use crate::store::RestItemStore;

/// Handles to the identity and item-store backends.
#[derive(Clone)]
pub struct BackendHandles {
    identity: IdentityBackend,
    store: RestItemStore,
}

impl BackendHandles {
    /// Identity provider backend.
    #[must_use]
    pub const fn identity(&self) -> &IdentityBackend {
        &self.identity
    }

    /// Item store client.
    #[must_use]
    pub const fn store(&self) -> &RestItemStore {
        &self.store
    }
}

/// Tagged backend availability, resolved once at startup.
///
/// Dependent operations check availability at this single boundary; there
/// are no nullable service handles checked ad hoc.
pub enum Backend {
    /// Backend parameters were valid; clients are ready.
    Available(BackendHandles),
    /// Backend parameters were missing or invalid; every dependent
    /// operation short-circuits to a "services unavailable" response.
    Unavailable {
        /// Why the backend could not be configured.
        reason: String,
    },
}

impl Backend {
    /// Build the backend state from the configuration load result.
    ///
    /// A configuration failure is captured here, once; the server still
    /// starts, degraded.
    #[must_use]
    pub fn from_config(
        launcher: &LauncherConfig,
        backend: Result<BackendConfig, ConfigError>,
    ) -> Self {
        match backend {
            Ok(config) => {
                let client = reqwest::Client::new();
                Self::Available(BackendHandles {
                    identity: IdentityBackend::new(&config, &launcher.base_url, client.clone()),
                    store: RestItemStore::new(&config, client),
                })
            }
            Err(e) => {
                tracing::error!("Backend configuration invalid, starting degraded: {e}");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like backend clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: LauncherConfig,
    registry: AppRegistry,
    backend: Backend,
    sessions: SessionRegistry,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: LauncherConfig, backend: Backend) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry: AppRegistry::builtin(),
                backend,
                sessions: SessionRegistry::new(),
            }),
        }
    }

    /// Get a reference to the launcher configuration.
    #[must_use]
    pub fn config(&self) -> &LauncherConfig {
        &self.inner.config
    }

    /// Get a reference to the static app registry.
    #[must_use]
    pub fn registry(&self) -> &AppRegistry {
        &self.inner.registry
    }

    /// Get a reference to the per-user session-handle registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Backend handles, or the degraded-mode error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` when the backend configuration was
    /// invalid at startup.
    pub fn backend(&self) -> Result<&BackendHandles, AppError> {
        match &self.inner.backend {
            Backend::Available(handles) => Ok(handles),
            Backend::Unavailable { reason } => Err(AppError::Unavailable(reason.clone())),
        }
    }

    /// The degraded-mode reason, if services are unavailable.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.inner.backend {
            Backend::Available(_) => None,
            Backend::Unavailable { reason } => Some(reason),
        }
    }
}
