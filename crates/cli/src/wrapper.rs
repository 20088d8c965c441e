//! Worker supervision
//!
//! Authenticates, spawns the worker process, and runs the periodic token
//! check. The worker inherits stdio so its own protocol traffic flows
//! through untouched; the token itself never appears in the worker's
//! argv or environment.
//!
//! Shutdown order matters: the refresh timer stops first, then the
//! worker is killed and reaped, so a mid-shutdown tick can never restart
//! a worker we are about to tear down.

use std::process::Stdio;
use std::time::Duration;

use keyrelay_common::TokenStore;
use keyrelay_domain::constants::REFRESH_CHECK_INTERVAL_SECS;
use keyrelay_domain::{Config, RelayError, Result, WorkerSettings};
use keyrelay_infra::OAuthService;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Authenticate, run the worker, and keep the token fresh until the
/// worker exits or a shutdown signal arrives.
///
/// Returns the worker's exit code, or 0 when shutdown was signal-driven.
pub async fn run(config: Config) -> Result<i32> {
    let mut store = TokenStore::new(&config.api.token_path);
    let service = OAuthService::new(config.oauth.clone());

    service.ensure_authenticated(&mut store).await?;

    if config.worker.command.is_empty() {
        return Err(RelayError::Config(
            "no worker command configured (worker_command / KEYRELAY_WORKER_CMD)".to_string(),
        ));
    }

    let mut worker = spawn_worker(&config.worker)?;

    let shutdown = CancellationToken::new();
    spawn_signal_watcher(shutdown.clone());

    let mut check = tokio::time::interval(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS));
    // The first tick completes immediately; the token was just validated
    check.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("shutting down");
                stop_worker(&mut worker).await;
                return Ok(0);
            }
            status = worker.wait() => {
                let status = status.map_err(|err| {
                    RelayError::Internal(format!("failed to wait on worker: {err}"))
                })?;
                let code = status.code().unwrap_or(0);
                info!(code, "worker exited");
                return Ok(code);
            }
            _ = check.tick() => {
                if maintain_tokens(&service, &mut store).await {
                    restart_worker(&config.worker, &mut worker).await;
                }
            }
        }
    }
}

/// Periodic token check. Returns true when the token was renewed and the
/// worker should be restarted to pick it up.
async fn maintain_tokens(service: &OAuthService, store: &mut TokenStore) -> bool {
    // Another process (or a forced login) may have rewritten the file
    store.reload();

    if store.has_valid_tokens() {
        return false;
    }

    info!("access token expiring, refreshing");
    match service.refresh(store).await {
        Ok(()) => true,
        Err(err) => {
            // Interactive login is not an option in the background loop
            warn!(error = %err, "token refresh failed; run `keyrelay login` to re-authenticate");
            false
        }
    }
}

fn spawn_worker(settings: &WorkerSettings) -> Result<Child> {
    info!(command = %settings.command, "starting worker");

    Command::new(&settings.command)
        .args(&settings.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| {
            RelayError::Internal(format!("failed to spawn worker '{}': {err}", settings.command))
        })
}

async fn restart_worker(settings: &WorkerSettings, worker: &mut Child) {
    info!("restarting worker with refreshed credentials");
    stop_worker(worker).await;
    match spawn_worker(settings) {
        Ok(child) => *worker = child,
        Err(err) => warn!(error = %err, "failed to restart worker"),
    }
}

async fn stop_worker(worker: &mut Child) {
    if let Err(err) = worker.start_kill() {
        // Already exited is fine; anything else is worth a log line
        if worker.try_wait().ok().flatten().is_none() {
            warn!(error = %err, "failed to kill worker");
            return;
        }
    }

    match tokio::time::timeout(Duration::from_secs(5), worker.wait()).await {
        Ok(Ok(status)) => info!(code = status.code().unwrap_or(0), "worker stopped"),
        Ok(Err(err)) => warn!(error = %err, "failed to reap worker"),
        Err(_) => warn!("worker did not stop within 5 seconds"),
    }
}

/// Cancel the token on SIGINT or SIGTERM.
fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                    if ctrl_c.await.is_ok() {
                        shutdown.cancel();
                    }
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        shutdown.cancel();
    });
}
