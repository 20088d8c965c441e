//! Credential primitives
//!
//! Token types, the on-disk store, and state generation. The HTTP side of
//! the flow (discovery, exchange, callback listener) lives in
//! `keyrelay-infra::oauth`.

pub mod state;
pub mod store;
pub mod types;

pub use state::generate_state;
pub use store::{read_record, TokenStore};
pub use types::{TokenRecord, TokenResponse};
