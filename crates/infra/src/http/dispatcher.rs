//! Domain-scoped bearer token injection
//!
//! [`ScopedBearerDispatcher`] executes outbound requests, attaching the
//! stored access token only when the request host exactly matches the
//! configured API host. Everything else passes through untouched.
//!
//! Matching is plain string equality on the hostname. Suffix or prefix
//! matching would let `api.example.com.evil.com` receive the token.
//!
//! Config and token files are re-read on every request, so a rotated
//! token or edited config takes effect without restarting. Any problem
//! along the way (missing config, missing token, unparseable URL) means
//! the request is sent without credentials rather than failed.

use std::path::PathBuf;

use keyrelay_common::read_record;
use keyrelay_domain::constants::{AUTH_TYPE_HEADER, AUTH_TYPE_VALUE};
use keyrelay_domain::{RelayError, Result};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tracing::{debug, warn};
use url::Url;

use crate::config::loader;

/// Executes requests, injecting a bearer token for the configured API
/// host only.
#[derive(Debug, Clone)]
pub struct ScopedBearerDispatcher {
    http: reqwest::Client,
    config_path: PathBuf,
}

impl ScopedBearerDispatcher {
    /// Create a dispatcher that reads configuration from the given file.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self { http: reqwest::Client::new(), config_path: config_path.into() }
    }

    /// Execute the request, attaching credentials when in scope.
    ///
    /// # Errors
    /// Returns `RelayError::Network` for transport failures. Authorization
    /// problems never fail the request; they only omit the credential.
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        self.authorize(&mut request);
        self.http
            .execute(request)
            .await
            .map_err(|err| RelayError::Network(format!("request failed: {err}")))
    }

    /// Attach the bearer token if, and only if, the request targets the
    /// configured API host. Existing headers are never overwritten.
    fn authorize(&self, request: &mut reqwest::Request) {
        let config = match loader::load_from(&self.config_path) {
            Ok(config) => config,
            Err(err) => {
                debug!(error = %err, "no usable configuration, sending request unauthenticated");
                return;
            }
        };

        let Some(api_host) = Url::parse(&config.api.base_url).ok().and_then(|url| {
            url.host_str().map(str::to_string)
        }) else {
            debug!(base_url = %config.api.base_url, "configured API base URL has no host");
            return;
        };

        let Some(request_host) = request.url().host_str() else {
            return;
        };

        if request_host != api_host {
            debug!(host = %request_host, "request host out of scope, no token attached");
            return;
        }

        let Some(record) = read_record(&config.api.token_path) else {
            debug!("no stored token, sending request unauthenticated");
            return;
        };

        let headers = request.headers_mut();

        if !headers.contains_key(AUTHORIZATION) {
            match HeaderValue::from_str(&format!("Bearer {}", record.access_token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(err) => {
                    warn!(error = %err, "stored access token is not a valid header value");
                    return;
                }
            }
        }

        let auth_type = HeaderName::from_static(AUTH_TYPE_HEADER);
        if !headers.contains_key(&auth_type) {
            headers.insert(auth_type, HeaderValue::from_static(AUTH_TYPE_VALUE));
        }
    }
}
