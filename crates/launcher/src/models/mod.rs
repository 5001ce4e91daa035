//! Session-related types.
//!
//! Types stored in the cookie session for authentication state.

use serde::{Deserialize, Serialize};

use wise_launcher_core::UserId;

use crate::identity::AuthUser;

/// Session-stored user identity.
///
/// Minimal data persisted in the session to identify the signed-in user
/// between requests; the identity provider remains the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Provider-issued user id.
    pub uid: UserId,
    /// Email address, when the provider disclosed one.
    pub email: Option<String>,
    /// Display name, when the provider disclosed one.
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// The principal to seed a restored provider session with.
    #[must_use]
    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Label shown in the header: display name, else email, else the id.
    #[must_use]
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.uid.to_string())
    }
}

impl From<AuthUser> for CurrentUser {
    fn from(user: AuthUser) -> Self {
        Self {
            uid: user.uid,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the federated redirect-flow `state` token (CSRF protection).
    pub const FEDERATED_STATE: &str = "federated_state";

    /// Key for a one-shot auth error message shown on the login page.
    pub const AUTH_FLASH: &str = "auth_flash";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_prefers_display_name() {
        let user = CurrentUser {
            uid: UserId::new("u-1"),
            email: Some("user@example.com".to_string()),
            display_name: Some("User".to_string()),
        };
        assert_eq!(user.label(), "User");
    }

    #[test]
    fn test_label_falls_back_to_email_then_uid() {
        let mut user = CurrentUser {
            uid: UserId::new("u-1"),
            email: Some("user@example.com".to_string()),
            display_name: None,
        };
        assert_eq!(user.label(), "user@example.com");

        user.email = None;
        assert_eq!(user.label(), "u-1");
    }
}
