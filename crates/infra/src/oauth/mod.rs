//! OAuth 2.0 authorization-code flow
//!
//! Four pieces, composed by [`OAuthService`]:
//! - [`discovery`]: OIDC endpoint discovery with a static fallback
//! - [`client`]: token endpoint client (exchange and refresh grants)
//! - [`callback`]: loopback listener for the browser redirect
//! - [`service`]: login, refresh, and logout orchestration

pub mod callback;
pub mod client;
pub mod discovery;
pub mod service;

pub use callback::CallbackServer;
pub use client::OAuthClient;
pub use discovery::Endpoints;
pub use service::{LoginSession, OAuthService};
