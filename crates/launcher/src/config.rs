//! Launcher configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Server (required unless defaulted)
//! - `LAUNCHER_BASE_URL` - Public URL for the launcher
//! - `LAUNCHER_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `LAUNCHER_HOST` - Bind address (default: 127.0.0.1)
//! - `LAUNCHER_PORT` - Listen port (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN (optional)
//!
//! ## Backend services
//! - `LAUNCHER_BACKEND_PROJECT` - Backend project identifier
//! - `LAUNCHER_BACKEND_API_KEY` - Backend API key (shared by identity and store)
//! - `LAUNCHER_IDENTITY_URL` - Identity provider base URL (default derived)
//! - `LAUNCHER_STORE_URL` - Item store base URL (default derived)
//! - `LAUNCHER_FEDERATED_PROVIDER` - Federated provider id (default: google.com)
//!
//! Missing or invalid *backend* parameters do not abort startup: the server
//! runs in a degraded mode where every dependent operation reports that
//! services are unavailable.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Launcher server configuration.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the launcher
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Connection parameters for the identity and item-store backends.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Backend project identifier
    pub project: String,
    /// API key used by both backend services
    pub api_key: SecretString,
    /// Identity provider base URL
    pub identity_url: String,
    /// Item store base URL
    pub store_url: String,
    /// Federated sign-in provider id (e.g., google.com)
    pub federated_provider: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("project", &self.project)
            .field("api_key", &"[REDACTED]")
            .field("identity_url", &self.identity_url)
            .field("store_url", &self.store_url)
            .field("federated_provider", &self.federated_provider)
            .finish()
    }
}

impl LauncherConfig {
    /// Load the server configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("LAUNCHER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LAUNCHER_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("LAUNCHER_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("LAUNCHER_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("LAUNCHER_BASE_URL")?;
        let session_secret = get_validated_secret("LAUNCHER_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "LAUNCHER_SESSION_SECRET")?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendConfig {
    /// Load the backend connection parameters from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the project id or API key is missing or the
    /// API key fails validation. Callers are expected to fold this into the
    /// degraded `Backend::Unavailable` state rather than aborting.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project = get_required_env("LAUNCHER_BACKEND_PROJECT")?;
        let api_key = get_validated_secret("LAUNCHER_BACKEND_API_KEY")?;
        let identity_url = get_env_or_default(
            "LAUNCHER_IDENTITY_URL",
            &format!("https://identity.wiseapps.dev/{project}"),
        );
        let store_url = get_env_or_default(
            "LAUNCHER_STORE_URL",
            &format!("https://store.wiseapps.dev/{project}"),
        );
        let federated_provider = get_env_or_default("LAUNCHER_FEDERATED_PROVIDER", "google.com");

        Ok(Self {
            project,
            api_key,
            identity_url,
            store_url,
            federated_provider,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
