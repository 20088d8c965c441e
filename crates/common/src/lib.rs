//! # KeyRelay Common
//!
//! Shared credential primitives for KeyRelay.
//!
//! This crate contains:
//! - OAuth token types (wire responses and the persisted record)
//! - The on-disk token store with expiry-aware validity checks
//! - State token generation for the authorization request
//!
//! ## Architecture
//! - Depends only on `keyrelay-domain`
//! - No network I/O; the OAuth client lives in `keyrelay-infra`

pub mod auth;

pub use auth::state::generate_state;
pub use auth::store::{read_record, TokenStore};
pub use auth::types::{TokenRecord, TokenResponse};
