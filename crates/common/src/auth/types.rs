//! OAuth 2.0 token types
//!
//! Defines the wire-format token response and the persisted credential
//! record. The record is what lands in `tokens.json`; it carries an
//! `issued_at` stamp so validity can be judged without trusting file
//! mtimes.

use chrono::Utc;
use keyrelay_domain::constants::EXPIRY_BUFFER_MS;
use serde::{Deserialize, Serialize};

/// OAuth token response from the authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749).
/// Deserializes responses from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the provider withholds it, notably on refresh grants
    pub refresh_token: Option<String>,
    /// ID token (JWT) containing user claims (OpenID Connect)
    pub id_token: Option<String>,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub scope: Option<String>,
}

/// Persisted credential record
///
/// A [`TokenResponse`] plus the `issued_at` timestamp stamped when the
/// record was saved. Validity is computed from `issued_at + expires_in`
/// rather than an absolute expiry, so the record survives clock-format
/// differences between providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// JWT access token for API authentication
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims (OpenID Connect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Token type (always "Bearer" for OAuth 2.0)
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Milliseconds since the Unix epoch at the moment the record was saved
    pub issued_at: i64,
}

impl TokenRecord {
    /// Build a record from a token response, stamping `issued_at` with the
    /// current time.
    #[must_use]
    pub fn from_response(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            scope: response.scope,
            issued_at: Utc::now().timestamp_millis(),
        }
    }

    /// Check validity against an explicit clock (milliseconds since epoch).
    ///
    /// A record is valid only while the access token has at least the
    /// expiry buffer left on its lifetime. A record inside the buffer
    /// window is treated as already expired.
    #[must_use]
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        let expires_at = self.issued_at + self.expires_in * 1000;
        now_ms + EXPIRY_BUFFER_MS <= expires_at
    }

    /// Check validity against the system clock.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis())
    }
}

impl From<TokenResponse> for TokenRecord {
    fn from(response: TokenResponse) -> Self {
        Self::from_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_in: i64, issued_at: i64) -> TokenRecord {
        TokenRecord {
            access_token: "access_token_123".to_string(),
            refresh_token: Some("refresh_token_456".to_string()),
            id_token: None,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: Some("openid email".to_string()),
            issued_at,
        }
    }

    #[test]
    fn fresh_record_is_valid() {
        let rec = record(3600, 1_000_000);
        // One second after issue, lifetime comfortably exceeds the buffer
        assert!(rec.is_valid_at(1_001_000));
    }

    #[test]
    fn record_inside_buffer_window_is_expired() {
        let rec = record(3600, 0);
        // 3600s lifetime minus 5min buffer leaves 3300s of usable life.
        // Exactly 5 minutes of slack is still valid; one ms less is not.
        assert!(rec.is_valid_at(3_300_000));
        assert!(!rec.is_valid_at(3_300_001));
        assert!(!rec.is_valid_at(3_600_000));
    }

    #[test]
    fn short_lived_token_is_never_valid() {
        // Lifetime shorter than the buffer is expired from the start
        let rec = record(60, 1_000_000);
        assert!(!rec.is_valid_at(1_000_000));
    }

    #[test]
    fn from_response_stamps_issued_at() {
        let before = Utc::now().timestamp_millis();
        let rec = TokenRecord::from_response(TokenResponse {
            access_token: "access".to_string(),
            refresh_token: None,
            id_token: Some("id789".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            scope: None,
        });
        let after = Utc::now().timestamp_millis();

        assert!(rec.issued_at >= before && rec.issued_at <= after);
        assert_eq!(rec.id_token, Some("id789".to_string()));
        assert!(rec.refresh_token.is_none());
        assert!(rec.is_valid());
    }

    #[test]
    fn record_roundtrips_through_json() {
        let rec = record(3600, 42);
        let json = serde_json::to_string(&rec).unwrap();
        let back: TokenRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, rec.access_token);
        assert_eq!(back.issued_at, 42);
        // None fields are omitted from the serialized form
        let no_refresh = TokenRecord { refresh_token: None, ..rec };
        let json = serde_json::to_string(&no_refresh).unwrap();
        assert!(!json.contains("refresh_token"));
    }
}
