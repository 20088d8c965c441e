//! Loopback HTTP listener for the OAuth browser redirect
//!
//! Binds `127.0.0.1` on the configured port and serves the callback path
//! once. The first redirect that carries a `code` or `error` parameter
//! resolves a oneshot channel; later requests get a "already completed"
//! page and change nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use keyrelay_domain::constants::CALLBACK_PATH;
use keyrelay_domain::{RelayError, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// What the provider's redirect carried.
#[derive(Debug)]
enum CallbackOutcome {
    /// Authorization code, ready for the token exchange
    Code(String),
    /// The provider redirected back with an `error` parameter
    Denied(String),
}

type OutcomeSender = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// Loopback server that receives the OAuth redirect.
pub struct CallbackServer {
    port: u16,
    outcome_rx: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Start listening on `127.0.0.1:port`. Port 0 binds ephemerally.
    ///
    /// # Errors
    /// Returns `RelayError::Network` if the port cannot be bound, which
    /// usually means another login is already in progress.
    pub async fn start(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|err| {
            RelayError::Network(format!("failed to bind callback listener on port {port}: {err}"))
        })?;

        let port = listener
            .local_addr()
            .map_err(|err| RelayError::Network(format!("failed to determine callback port: {err}")))?
            .port();

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let sender: OutcomeSender = Arc::new(Mutex::new(Some(outcome_tx)));

        let app = Router::new().route(
            CALLBACK_PATH,
            get(move |query: Query<HashMap<String, String>>| {
                handle_callback(query, sender.clone())
            }),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("callback listener error: {err}");
            }
        });

        debug!(port, "callback listener started");

        Ok(Self { port, outcome_rx: Some(outcome_rx), shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Port the listener actually bound.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI pointing at this listener.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.port)
    }

    /// Await the redirect and return the authorization code.
    ///
    /// # Errors
    /// - `RelayError::AuthTimeout` when nothing arrives within `timeout`
    /// - `RelayError::AuthDenied` when the provider reported an error
    pub async fn wait_for_code(&mut self, timeout: Duration) -> Result<String> {
        let rx = self
            .outcome_rx
            .take()
            .ok_or_else(|| RelayError::Internal("callback already awaited".to_string()))?;

        let outcome = tokio::time::timeout(timeout, rx).await.map_err(|_| {
            RelayError::AuthTimeout(format!(
                "no authorization response within {} seconds",
                timeout.as_secs()
            ))
        })?;

        match outcome {
            Ok(CallbackOutcome::Code(code)) => Ok(code),
            Ok(CallbackOutcome::Denied(reason)) => Err(RelayError::AuthDenied(reason)),
            Err(_) => Err(RelayError::Internal("callback listener dropped".to_string())),
        }
    }

    /// Shut the listener down gracefully.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(RelayError::Internal(format!("callback listener panicked: {err}")));
                }
            }
        }

        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    Query(params): Query<HashMap<String, String>>,
    sender: OutcomeSender,
) -> Html<&'static str> {
    let outcome = if let Some(error) = params.get("error") {
        let reason = match params.get("error_description") {
            Some(description) => format!("{error}: {description}"),
            None => error.clone(),
        };
        Some(CallbackOutcome::Denied(reason))
    } else {
        params.get("code").cloned().map(CallbackOutcome::Code)
    };

    let Some(outcome) = outcome else {
        return Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The redirect carried no authorization code.</p></body>
</html>"#,
        );
    };

    // The sender is taken exactly once; duplicate redirects are inert
    let Some(tx) = sender.lock().ok().and_then(|mut guard| guard.take()) else {
        return Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Already Completed</h1><p>This login has already finished. You can close this window.</p></body>
</html>"#,
        );
    };

    let page = match &outcome {
        CallbackOutcome::Code(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#,
        ),
        CallbackOutcome::Denied(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The provider denied the request. You can close this window.</p></body>
</html>"#,
        ),
    };

    let _ = tx.send(outcome);
    page
}
