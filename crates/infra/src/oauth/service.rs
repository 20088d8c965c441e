//! OAuth login orchestration
//!
//! Ties the pieces together: generate a state token, stand up the
//! callback listener, send the browser to the provider, exchange the
//! returned code, and persist the result. Also owns the refresh and
//! logout paths.

use std::time::Duration;

use keyrelay_common::{generate_state, TokenStore};
use keyrelay_domain::constants::AUTH_TIMEOUT_SECS;
use keyrelay_domain::{OAuthSettings, RelayError, Result};
use tracing::{info, warn};

use super::callback::CallbackServer;
use super::client::OAuthClient;

/// High-level OAuth service: login, refresh, logout.
pub struct OAuthService {
    client: OAuthClient,
    open_browser: bool,
}

impl OAuthService {
    /// Create a service for the given provider settings.
    #[must_use]
    pub fn new(settings: OAuthSettings) -> Self {
        Self { client: OAuthClient::new(settings), open_browser: true }
    }

    /// Control whether `login` launches the system browser. Disabled in
    /// tests, where the callback is driven directly.
    #[must_use]
    pub fn with_browser(mut self, enabled: bool) -> Self {
        self.open_browser = enabled;
        self
    }

    /// The underlying token client.
    #[must_use]
    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Begin an interactive login: bind the callback listener and build
    /// the authorization URL. The browser is not opened yet.
    ///
    /// # Errors
    /// Returns `RelayError::Network` if the callback port cannot be bound.
    pub async fn start_login(&self) -> Result<LoginSession<'_>> {
        let settings = self.client.settings();
        let server = CallbackServer::start(settings.callback_port).await?;

        // Port 0 binds ephemerally, so derive the URI from the listener
        let redirect_uri = if settings.callback_port == 0 {
            server.redirect_uri()
        } else {
            settings.redirect_uri.clone()
        };

        let state = generate_state();
        let authorization_url = self.client.authorization_url(&state, &redirect_uri).await;

        Ok(LoginSession { client: &self.client, server, redirect_uri, authorization_url })
    }

    /// Run the full interactive login and persist the resulting tokens.
    ///
    /// # Errors
    /// Propagates listener, timeout, denial, and exchange errors. The
    /// store is only written after a successful exchange.
    pub async fn login(&self, store: &mut TokenStore) -> Result<()> {
        let session = self.start_login().await?;

        if self.open_browser {
            info!("opening browser for authentication");
            if let Err(err) = open::that(session.authorization_url()) {
                warn!(error = %err, "failed to open browser");
                info!(url = %session.authorization_url(), "open this URL to authenticate");
            }
        } else {
            info!(url = %session.authorization_url(), "open this URL to authenticate");
        }

        session.finish(store, Duration::from_secs(AUTH_TIMEOUT_SECS)).await
    }

    /// Refresh the stored access token and persist the result.
    ///
    /// # Errors
    /// Returns `RelayError::TokenRefresh` when no refresh token is stored
    /// or the provider rejects it.
    pub async fn refresh(&self, store: &mut TokenStore) -> Result<()> {
        let refresh_token = store
            .refresh_token()
            .map(str::to_string)
            .ok_or_else(|| RelayError::TokenRefresh("no refresh token available".to_string()))?;

        let response = self.client.refresh(&refresh_token).await?;
        store.save_refreshed(response)?;
        info!("access token refreshed");
        Ok(())
    }

    /// Make sure the store holds a valid access token, doing as little as
    /// possible: nothing if the token is still valid, a silent refresh if
    /// one is possible, a full interactive login otherwise.
    pub async fn ensure_authenticated(&self, store: &mut TokenStore) -> Result<()> {
        if store.has_valid_tokens() {
            return Ok(());
        }

        if store.refresh_token().is_some() {
            match self.refresh(store).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(error = %err, "token refresh failed, falling back to interactive login");
                }
            }
        }

        self.login(store).await
    }

    /// Drop the stored credentials.
    pub fn logout(&self, store: &mut TokenStore) -> Result<()> {
        store.clear()?;
        info!("stored credentials cleared");
        Ok(())
    }
}

/// An in-flight interactive login.
pub struct LoginSession<'a> {
    client: &'a OAuthClient,
    server: CallbackServer,
    redirect_uri: String,
    authorization_url: String,
}

impl LoginSession<'_> {
    /// Authorization URL to open in the user's browser.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    /// Redirect URI the callback listener is serving.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the redirect, exchange the code, persist the tokens, and
    /// shut the listener down.
    pub async fn finish(mut self, store: &mut TokenStore, timeout: Duration) -> Result<()> {
        let code = self.server.wait_for_code(timeout).await?;
        let response = self.client.exchange_code(&code, &self.redirect_uri).await?;
        store.save(response)?;

        self.server.shutdown().await?;
        info!("authentication complete");
        Ok(())
    }
}
