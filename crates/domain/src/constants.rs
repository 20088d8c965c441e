//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Token lifecycle
/// Safety margin subtracted from the access-token lifetime: a token within
/// this window of expiry is treated as already expired.
pub const EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;
/// How long the callback listener waits for the browser redirect.
pub const AUTH_TIMEOUT_SECS: u64 = 300;
/// Cadence of the background token-validity check.
pub const REFRESH_CHECK_INTERVAL_SECS: u64 = 300;

// OAuth endpoints
pub const CALLBACK_PATH: &str = "/authorization-code/callback";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
/// Canonical paths used when OIDC discovery fails.
pub const FALLBACK_AUTHORIZE_PATH: &str = "/oauth2/v1/authorize";
pub const FALLBACK_TOKEN_PATH: &str = "/oauth2/v1/token";

// Configuration defaults
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
pub const DEFAULT_SCOPES: &str = "openid email profile offline_access";
/// Per-user directory holding the config file, token file, and logs.
pub const CONFIG_DIR_NAME: &str = ".keyrelay";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const TOKEN_FILE_NAME: &str = "tokens.json";
pub const LOG_DIR_NAME: &str = "logs";

// Injected headers
/// Marker header identifying the injected credential as OAuth-sourced.
pub const AUTH_TYPE_HEADER: &str = "x-keyrelay-auth-type";
pub const AUTH_TYPE_VALUE: &str = "OAUTH";
