//! OCO CLI support
//!
//! Configuration loading and text rendering for the `oco` binary. Command
//! dispatch lives in `main.rs`.

pub mod config;
pub mod render;

pub use config::{CliConfig, ConfigError, Credentials, load_config, load_config_from_str};
