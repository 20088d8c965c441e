//! OIDC endpoint discovery
//!
//! Fetches `{issuer}/.well-known/openid-configuration` and extracts the
//! authorization and token endpoints. Discovery failures of any kind
//! (network, non-2xx, malformed document) fall back silently to the
//! conventional `/oauth2/v1/*` paths under the issuer, so providers
//! without a discovery document still work.

use keyrelay_domain::constants::{DISCOVERY_PATH, FALLBACK_AUTHORIZE_PATH, FALLBACK_TOKEN_PATH};
use serde::Deserialize;
use tracing::{debug, warn};

/// The two endpoints the authorization-code flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

impl Endpoints {
    /// Conventional endpoints under the issuer, used when discovery fails.
    #[must_use]
    pub fn fallback(issuer_url: &str) -> Self {
        Self {
            authorization_endpoint: format!("{issuer_url}{FALLBACK_AUTHORIZE_PATH}"),
            token_endpoint: format!("{issuer_url}{FALLBACK_TOKEN_PATH}"),
        }
    }
}

/// Resolve the provider's endpoints, preferring the discovery document.
///
/// Never fails: any discovery problem degrades to [`Endpoints::fallback`].
pub async fn discover(http: &reqwest::Client, issuer_url: &str) -> Endpoints {
    let discovery_url = format!("{issuer_url}{DISCOVERY_PATH}");

    let response = match http.get(&discovery_url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(url = %discovery_url, error = %err, "OIDC discovery request failed, using fallback endpoints");
            return Endpoints::fallback(issuer_url);
        }
    };

    if !response.status().is_success() {
        warn!(url = %discovery_url, status = %response.status(), "OIDC discovery returned an error, using fallback endpoints");
        return Endpoints::fallback(issuer_url);
    }

    match response.json::<Endpoints>().await {
        Ok(endpoints) => {
            debug!(
                authorization_endpoint = %endpoints.authorization_endpoint,
                token_endpoint = %endpoints.token_endpoint,
                "resolved endpoints from discovery document"
            );
            endpoints
        }
        Err(err) => {
            warn!(url = %discovery_url, error = %err, "OIDC discovery document was malformed, using fallback endpoints");
            Endpoints::fallback(issuer_url)
        }
    }
}
