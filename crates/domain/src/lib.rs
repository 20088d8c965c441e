//! # KeyRelay Domain
//!
//! Domain types and models for KeyRelay.
//!
//! This crate contains:
//! - Configuration structures
//! - Domain error types and Result definitions
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other KeyRelay crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::{ApiSettings, Config, OAuthSettings, WorkerSettings};
pub use errors::{RelayError, Result};
