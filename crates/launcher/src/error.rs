//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type mirroring the launcher's failure
//! taxonomy (configuration, auth, store, validation, session) that captures
//! server-class errors to Sentry before responding to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::identity::ProviderError;
use crate::services::pantry::PantryError;
use crate::store::StoreError;

/// Application-level error type for the launcher.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend services are not configured or not reachable.
    #[error("Services unavailable: {0}")]
    Unavailable(String),

    /// Identity provider operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] ProviderError),

    /// Item store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Shopping-list operation failed (validation or store).
    #[error("Pantry error: {0}")]
    Pantry(#[from] PantryError),

    /// Session read/write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Store(_) | Self::Session(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                ProviderError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                ProviderError::EmailInUse => StatusCode::CONFLICT,
                ProviderError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                ProviderError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Pantry(err) => {
                if err.is_validation() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Unavailable(_) | Self::Auth(ProviderError::Unavailable) => {
                "Services are temporarily unavailable. Please try again later.".to_string()
            }
            Self::Store(_) => {
                "The shopping service did not respond. Please try again.".to_string()
            }
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                ProviderError::InvalidCredentials => "Invalid email or password".to_string(),
                ProviderError::EmailInUse => {
                    "An account with this email already exists".to_string()
                }
                ProviderError::WeakPassword(detail) => {
                    format!("Password is too weak: {detail}")
                }
                _ => "Authentication error".to_string(),
            },
            Self::Pantry(err) => {
                if err.is_validation() {
                    err.to_string()
                } else {
                    "The shopping service did not respond. Please try again.".to_string()
                }
            }
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::Unavailable("backend not configured".to_string());
        assert_eq!(
            err.to_string(),
            "Services unavailable: backend not configured"
        );

        let err = AppError::Internal("unexpected".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_configuration_failures_are_service_unavailable() {
        assert_eq!(
            get_status(AppError::Unavailable("not configured".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Auth(ProviderError::Unavailable)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_auth_failures_map_to_client_statuses() {
        assert_eq!(
            get_status(AppError::Auth(ProviderError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(ProviderError::EmailInUse)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(ProviderError::WeakPassword(
                "too short".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_failures_are_bad_gateway() {
        let store_error = StoreError::Backend {
            status: 502,
            message: "upstream".to_string(),
        };
        assert_eq!(get_status(AppError::Store(store_error)), StatusCode::BAD_GATEWAY);

        // A store failure surfaced through the pantry maps the same way
        let pantry_store = PantryError::Store(StoreError::Backend {
            status: 503,
            message: "upstream".to_string(),
        });
        assert_eq!(get_status(AppError::Pantry(pantry_store)), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_validation_failures_are_bad_request_with_field_message() {
        assert_eq!(
            get_status(AppError::Pantry(PantryError::EmptyName)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Pantry(PantryError::InvalidQuantity)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_failures_are_masked() {
        assert_eq!(
            get_status(AppError::Internal("secret detail".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
