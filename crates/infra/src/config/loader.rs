//! Configuration loader
//!
//! Builds the application [`Config`] by overlaying three sources, highest
//! precedence first:
//! 1. `KEYRELAY_*` environment variables (per field)
//! 2. The JSON config file (`~/.keyrelay/config.json` by default)
//! 3. Built-in defaults
//!
//! ## Environment Variables
//! - `KEYRELAY_CLIENT_ID`: OAuth client ID (required)
//! - `KEYRELAY_CLIENT_SECRET`: OAuth client secret (required)
//! - `KEYRELAY_ISSUER_URL`: Issuer base URL (required)
//! - `KEYRELAY_API_BASE_URL`: API origin that receives the token (required)
//! - `KEYRELAY_REDIRECT_URI`: Redirect URI registered with the provider
//! - `KEYRELAY_CALLBACK_PORT`: Loopback callback port
//! - `KEYRELAY_SCOPES`: Scopes, space- or comma-delimited
//! - `KEYRELAY_TOKEN_PATH`: Path of the persisted token file
//! - `KEYRELAY_WORKER_CMD`: Worker command to spawn
//! - `KEYRELAY_WORKER_ARGS`: Worker arguments, space-delimited
//!
//! The four required fields may each come from any source; loading fails
//! only when a required field is present in none of them.

use std::path::{Path, PathBuf};

use keyrelay_domain::constants::{
    CALLBACK_PATH, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CALLBACK_PORT, DEFAULT_SCOPES,
    TOKEN_FILE_NAME,
};
use keyrelay_domain::{ApiSettings, Config, OAuthSettings, RelayError, Result, WorkerSettings};
use serde::Deserialize;

/// Shape of the on-disk config file. Every field is optional; the loader
/// fills gaps from the environment and defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
    issuer_url: Option<String>,
    redirect_uri: Option<String>,
    callback_port: Option<u16>,
    scopes: Option<String>,
    api_base_url: Option<String>,
    token_path: Option<PathBuf>,
    worker_command: Option<String>,
    worker_args: Option<Vec<String>>,
}

/// The per-user KeyRelay directory (`~/.keyrelay`).
///
/// # Errors
/// Returns `RelayError::Config` if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let base = directories::BaseDirs::new()
        .ok_or_else(|| RelayError::Config("could not determine home directory".to_string()))?;
    Ok(base.home_dir().join(CONFIG_DIR_NAME))
}

/// Default location of the config file.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Default location of the token file.
pub fn default_token_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(TOKEN_FILE_NAME))
}

/// Load configuration from the default config file location.
///
/// # Errors
/// Returns `RelayError::Config` if a required field is missing from every
/// source or a value fails to parse.
pub fn load() -> Result<Config> {
    load_from(&default_config_path()?)
}

/// Load configuration, overlaying the environment on the given file.
///
/// A missing file is not an error; the environment and defaults may still
/// produce a complete configuration. A present but malformed file is
/// rejected rather than silently ignored.
pub fn load_from(path: &Path) -> Result<Config> {
    let raw = read_raw(path)?;

    let client_id = env_var("KEYRELAY_CLIENT_ID").or(raw.client_id);
    let client_secret = env_var("KEYRELAY_CLIENT_SECRET").or(raw.client_secret);
    let issuer_url = env_var("KEYRELAY_ISSUER_URL").or(raw.issuer_url);
    let api_base_url = env_var("KEYRELAY_API_BASE_URL").or(raw.api_base_url);

    let mut missing = Vec::new();
    if client_id.is_none() {
        missing.push("client_id (KEYRELAY_CLIENT_ID)");
    }
    if client_secret.is_none() {
        missing.push("client_secret (KEYRELAY_CLIENT_SECRET)");
    }
    if issuer_url.is_none() {
        missing.push("issuer_url (KEYRELAY_ISSUER_URL)");
    }
    if api_base_url.is_none() {
        missing.push("api_base_url (KEYRELAY_API_BASE_URL)");
    }
    if !missing.is_empty() {
        return Err(RelayError::Config(format!(
            "missing required configuration: {}",
            missing.join(", ")
        )));
    }

    let callback_port = match env_var("KEYRELAY_CALLBACK_PORT") {
        Some(value) => value
            .parse::<u16>()
            .map_err(|e| RelayError::Config(format!("invalid KEYRELAY_CALLBACK_PORT: {e}")))?,
        None => raw.callback_port.unwrap_or(DEFAULT_CALLBACK_PORT),
    };

    let redirect_uri = env_var("KEYRELAY_REDIRECT_URI")
        .or(raw.redirect_uri)
        .unwrap_or_else(|| format!("http://localhost:{callback_port}{CALLBACK_PATH}"));

    let scopes = env_var("KEYRELAY_SCOPES")
        .or(raw.scopes)
        .unwrap_or_else(|| DEFAULT_SCOPES.to_string());

    let token_path = match env_var("KEYRELAY_TOKEN_PATH") {
        Some(value) => PathBuf::from(value),
        None => match raw.token_path {
            Some(path) => path,
            None => default_token_path()?,
        },
    };

    let worker_command = env_var("KEYRELAY_WORKER_CMD")
        .or(raw.worker_command)
        .unwrap_or_default();
    let worker_args = match env_var("KEYRELAY_WORKER_ARGS") {
        Some(value) => value.split_whitespace().map(str::to_string).collect(),
        None => raw.worker_args.unwrap_or_default(),
    };

    // These are checked non-empty above
    let issuer_url = issuer_url.unwrap_or_default();

    Ok(Config {
        oauth: OAuthSettings {
            client_id: client_id.unwrap_or_default(),
            client_secret: client_secret.unwrap_or_default(),
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
            redirect_uri,
            callback_port,
            scopes,
        },
        api: ApiSettings { base_url: api_base_url.unwrap_or_default(), token_path },
        worker: WorkerSettings { command: worker_command, args: worker_args },
    })
}

/// Read and parse the config file, treating a missing file as empty.
fn read_raw(path: &Path) -> Result<RawConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using environment and defaults");
            return Ok(RawConfig::default());
        }
        Err(err) => {
            return Err(RelayError::Config(format!(
                "failed to read config file {}: {err}",
                path.display()
            )));
        }
    };

    serde_json::from_str(&contents).map_err(|e| {
        RelayError::Config(format!("invalid config file {}: {e}", path.display()))
    })
}

/// Get an environment variable, treating empty values as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
