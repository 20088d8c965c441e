//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for KeyRelay
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RelayError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential file read/write failure. Write failures are re-thrown
    /// to the caller; a failed persist must not be silently swallowed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport-level failure (DNS, TLS, refused connection, proxy).
    /// Distinct from a provider rejection so users can self-diagnose
    /// corporate network issues.
    #[error("Network error: {0}")]
    Network(String),

    /// No callback arrived within the authentication window.
    #[error("Authentication timed out: {0}")]
    AuthTimeout(String),

    /// The provider redirected back with an `error` parameter.
    #[error("Authentication denied by provider: {0}")]
    AuthDenied(String),

    /// The provider rejected the authorization-code exchange.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The provider rejected the refresh-token exchange.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for KeyRelay operations
pub type Result<T> = std::result::Result<T, RelayError>;
