//! # KeyRelay Infrastructure
//!
//! Infrastructure layer for KeyRelay.
//!
//! This crate contains:
//! - Configuration loading (environment, config file, defaults)
//! - The OAuth authorization-code flow: OIDC discovery, the token client,
//!   the loopback callback listener, and the login/refresh service
//! - The domain-scoped request dispatcher that injects bearer tokens
//!
//! ## Architecture
//! - Depends on `keyrelay-domain` and `keyrelay-common`
//! - All network and filesystem side effects live here

pub mod config;
pub mod http;
pub mod oauth;

pub use config::loader;
pub use http::ScopedBearerDispatcher;
pub use oauth::{CallbackServer, LoginSession, OAuthClient, OAuthService};
