//! Configuration structures
//!
//! Static configuration supplied by the environment or the user config
//! file. Loaded once at startup by `keyrelay-infra` and immutable for the
//! process lifetime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub oauth: OAuthSettings,
    pub api: ApiSettings,
    pub worker: WorkerSettings,
}

/// OAuth client configuration for the single configured identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret (confidential client)
    pub client_secret: String,

    /// Issuer base URL (e.g., "https://your-domain.okta.com"), without a
    /// trailing slash
    pub issuer_url: String,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,

    /// Port the loopback callback listener binds to
    pub callback_port: u16,

    /// Space-delimited scope list
    pub scopes: String,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the one API origin that may receive the bearer token
    pub base_url: String,

    /// Path of the persisted credential record
    pub token_path: PathBuf,
}

/// Downstream worker process configuration.
///
/// The worker never receives the token via argv or environment; it is
/// expected to issue its API calls through the scoped dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Command to spawn (empty means `run` is unavailable)
    #[serde(default)]
    pub command: String,

    /// Arguments passed to the command
    #[serde(default)]
    pub args: Vec<String>,
}

impl OAuthSettings {
    /// Scopes normalized to the space-delimited form OAuth expects.
    /// Accepts comma- or space-delimited input.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes
            .split([',', ' '])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(scopes: &str) -> OAuthSettings {
        OAuthSettings {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            issuer_url: "https://issuer.example.com".to_string(),
            redirect_uri: "http://localhost:8080/authorization-code/callback".to_string(),
            callback_port: 8080,
            scopes: scopes.to_string(),
        }
    }

    #[test]
    fn scope_string_normalizes_commas() {
        let s = settings("openid,email,profile,offline_access");
        assert_eq!(s.scope_string(), "openid email profile offline_access");
    }

    #[test]
    fn scope_string_passes_through_spaces() {
        let s = settings("openid email");
        assert_eq!(s.scope_string(), "openid email");
    }

    #[test]
    fn scope_string_collapses_mixed_delimiters() {
        let s = settings("openid, email,  profile");
        assert_eq!(s.scope_string(), "openid email profile");
    }
}
