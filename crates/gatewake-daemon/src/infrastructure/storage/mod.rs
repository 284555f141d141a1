//! Configuration persistence.

pub mod config;

pub use config::{load_config, AppConfig, ConfigError};
