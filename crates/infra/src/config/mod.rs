//! Configuration loading

pub mod loader;

pub use loader::{config_dir, default_config_path, default_token_path, load, load_from};
