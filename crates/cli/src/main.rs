//! KeyRelay command-line interface
//!
//! `keyrelay run` authenticates, spawns the configured worker, and keeps
//! the stored access token fresh for as long as the worker lives.
//! `keyrelay login` and `keyrelay logout` manage the stored credentials
//! directly.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use keyrelay_common::TokenStore;
use keyrelay_domain::constants::LOG_DIR_NAME;
use keyrelay_domain::{Config, Result};
use keyrelay_infra::config::loader;
use keyrelay_infra::OAuthService;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod wrapper;

#[derive(Parser)]
#[command(name = "keyrelay", version, about = "Local OAuth credential manager for a worker process")]
struct Cli {
    /// Path to the config file (default: ~/.keyrelay/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate, spawn the worker, and keep the token fresh (default)
    Run,
    /// Authenticate interactively through the browser
    Login {
        /// Re-authenticate even if valid tokens are already stored
        #[arg(long)]
        force: bool,
    },
    /// Remove stored credentials
    Logout,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs flush on exit
    let _log_guard = init_tracing();

    // Single-process, I/O-bound tool: one thread is plenty
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(dispatch(cli));

    match outcome {
        Ok(code) => ExitCode::from(u8::try_from(code.clamp(0, 255)).unwrap_or(1)),
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load_config(cli.config.as_deref())?;
            wrapper::run(config).await
        }
        Commands::Login { force } => {
            let config = load_config(cli.config.as_deref())?;
            login(&config, force).await?;
            Ok(0)
        }
        Commands::Logout => {
            logout(cli.config.as_deref())?;
            Ok(0)
        }
    }
}

async fn login(config: &Config, force: bool) -> Result<()> {
    let mut store = TokenStore::new(&config.api.token_path);

    if !force && store.has_valid_tokens() {
        info!("already authenticated; use --force to re-authenticate");
        return Ok(());
    }

    if force {
        store.clear()?;
    }

    let service = OAuthService::new(config.oauth.clone());
    service.login(&mut store).await
}

/// Logout works even with an incomplete config; the default token path
/// is enough to delete the file.
fn logout(config_path: Option<&std::path::Path>) -> Result<()> {
    let token_path = match load_config(config_path) {
        Ok(config) => config.api.token_path,
        Err(_) => loader::default_token_path()?,
    };

    let mut store = TokenStore::new(token_path);
    store.clear()?;
    info!("stored credentials cleared");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => loader::load_from(path),
        None => loader::load(),
    }
}

/// Log to stderr and a daily file under `~/.keyrelay/logs`. Stdout stays
/// untouched; it belongs to the worker.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_env("KEYRELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer =
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);

    match loader::config_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join(LOG_DIR_NAME), "keyrelay.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry().with(env_filter).with(stderr_layer).init();
            None
        }
    }
}
